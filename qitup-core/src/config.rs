use std::time::Duration;

/// Settings shared by every party session in the process.
#[derive(Debug, Clone)]
pub struct Config {
    /// How often an adapter asks the remote player for its state while playing
    pub poll_interval: Duration,
    /// How long an issued connect token stays redeemable
    pub connect_token_ttl: Duration,
    /// Inactivity timeout for parties that don't specify their own
    pub default_party_timeout: Duration,
    /// Key prefix of durable queue lists
    pub queue_prefix: String,
    /// Key prefix of connect tokens
    pub connect_token_prefix: String,
}

impl Config {
    /// The durable list key holding a party's queue
    pub fn queue_key(&self, party_id: &str) -> String {
        format!("{}{}", self.queue_prefix, party_id)
    }

    /// The durable key a connect token is stored under
    pub fn connect_token_key(&self, token: &str) -> String {
        format!("{}{}", self.connect_token_prefix, token)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            connect_token_ttl: Duration::from_secs(30),
            // A quarter of an hour without anything playing
            default_party_timeout: Duration::from_secs(15 * 60),
            queue_prefix: "queue:".to_string(),
            connect_token_prefix: "join_code:".to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_keys() {
        let config = Config::default();

        assert_eq!(config.queue_key("abc"), "queue:abc");
        assert_eq!(config.connect_token_key("xyz="), "join_code:xyz=");
    }
}
