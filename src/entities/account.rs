/// A share-holding address.
///
/// Primary Key: address
#[derive(Debug, Clone)]
pub struct Account {
    pub address: String,
    /// Reserved referral link; no current event kind populates it.
    pub referral: Option<String>,
}

impl Account {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_lowercase(),
            referral: None,
        }
    }
}
