use uuid::Uuid;

use crate::inner::model::advertisement::Advertisement;

/// Operation-specific success payload handed to a continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Response {
    Advertisements(Vec<Advertisement>),
    Services(Vec<Uuid>),
    Characteristics(Vec<Uuid>),
    Value(Vec<u8>),
}
