pub(crate) mod central_configuration;
