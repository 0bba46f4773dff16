use std::fmt;
use std::io::Write;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::write::EncoderWriter;
use http::{header, HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;

use crate::error::ConfigurationError;

#[derive(Clone, Eq, PartialEq)]
pub struct BasicAuth {
    pub username: String,
    pub password: Option<String>,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BasicAuth {{ username: {}, password: ****** }}", self.username)
    }
}

/// Configuration for one `SchemaRegistryClient`: one endpoint, one set of credentials.
#[derive(Clone)]
pub struct SchemaRegistryConfig {
    pub(crate) url: String,
    pub(crate) auth: Option<BasicAuth>,
    pub(crate) timeout: Duration,
    pub(crate) user_agent: String,
}

impl SchemaRegistryConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth: None,
            timeout: Duration::from_secs(60),
            user_agent: format!("registry-sync/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.auth = Some(BasicAuth {
            username: username.into(),
            password,
        });
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn basic_auth_header(auth: &BasicAuth) -> Result<(HeaderName, HeaderValue), ConfigurationError> {
    let mut buf = b"Basic ".to_vec();
    {
        let mut encoder = EncoderWriter::new(&mut buf, &BASE64_STANDARD);
        write!(encoder, "{}:", auth.username)?;
        if let Some(password) = &auth.password {
            write!(encoder, "{}", password)?;
        }
    }

    let mut header_value = HeaderValue::from_bytes(&buf)?;
    header_value.set_sensitive(true);
    Ok((header::AUTHORIZATION, header_value))
}

pub(crate) fn build_http_client(conf: &SchemaRegistryConfig) -> Result<Client, ConfigurationError> {
    let mut headers = HeaderMap::new();

    if let Some(auth) = &conf.auth {
        let (name, value) = basic_auth_header(auth)?;
        headers.insert(name, value);
    }

    let client = Client::builder()
        .default_headers(headers)
        .user_agent(conf.user_agent.clone())
        .timeout(conf.timeout)
        .build()?;

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_header_is_base64_encoded() {
        let auth = BasicAuth {
            username: "key".to_string(),
            password: Some("secret".to_string()),
        };

        let (name, value) = basic_auth_header(&auth).unwrap();

        assert_eq!(name, header::AUTHORIZATION);
        assert!(value.to_str().unwrap().starts_with("Basic "));
        assert!(value.is_sensitive());
    }

    #[test]
    fn config_defaults_to_a_sixty_second_timeout() {
        let conf = SchemaRegistryConfig::new("http://localhost:8081");
        assert_eq!(conf.timeout, Duration::from_secs(60));
    }
}
