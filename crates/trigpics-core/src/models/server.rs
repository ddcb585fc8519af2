use serde::{Deserialize, Serialize};

/// Host that serves photo objects.
///
/// `url` is the public base every stored key is joined onto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: i64,
    pub url: String,
    pub path: String,
    pub name: String,
}
