pub(crate) mod advertisement;
pub(crate) mod central_notification;
pub(crate) mod fqcn;
pub(crate) mod peripheral_id;
pub(crate) mod radio_event;
pub(crate) mod radio_state;
pub(crate) mod response;
