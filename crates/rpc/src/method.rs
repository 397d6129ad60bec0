use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Operations of the user service.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Ping,
    AuthenticateUserCredentials,
    AuthenticatePlatform,
    AuthenticateServer,
    AuthenticateWebSocketToken,
    HasPermission,
    ValidateToken,
    RenewToken,
}

impl Method {
    pub const ALL: [Method; 8] = [
        Method::Ping,
        Method::AuthenticateUserCredentials,
        Method::AuthenticatePlatform,
        Method::AuthenticateServer,
        Method::AuthenticateWebSocketToken,
        Method::HasPermission,
        Method::ValidateToken,
        Method::RenewToken,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Ping => "Ping",
            Method::AuthenticateUserCredentials => "AuthenticateUserCredentials",
            Method::AuthenticatePlatform => "AuthenticatePlatform",
            Method::AuthenticateServer => "AuthenticateServer",
            Method::AuthenticateWebSocketToken => "AuthenticateWebSocketToken",
            Method::HasPermission => "HasPermission",
            Method::ValidateToken => "ValidateToken",
            Method::RenewToken => "RenewToken",
        }
    }

    /// HTTP path the method is served on.
    pub fn path(&self) -> String {
        format!("/rpc/{}", self.as_str())
    }
}

impl core::fmt::Display for Method {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = crate::RpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| crate::RpcError::UnknownMethod(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for method in Method::ALL {
            assert_eq!(method.as_str().parse::<Method>().unwrap(), method);
        }
        assert!("ping".parse::<Method>().is_err());
        assert_eq!(Method::HasPermission.path(), "/rpc/HasPermission");
    }
}
