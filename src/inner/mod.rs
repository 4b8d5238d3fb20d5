pub(crate) mod availability;
pub(crate) mod central;
pub(crate) mod conf;
pub(crate) mod device;
pub(crate) mod dispatcher;
pub(crate) mod error;
pub(crate) mod executor;
pub(crate) mod metrics;
pub(crate) mod model;
pub(crate) mod publish;
pub(crate) mod radio;
pub(crate) mod registry;
pub(crate) mod request;
pub(crate) mod session_manager;
pub(crate) mod timeout_supervisor;
