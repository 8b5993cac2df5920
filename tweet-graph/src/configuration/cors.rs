//! Cross Origin Resource Sharing (CORS configuration)

use http::HeaderValue;
use http::Method;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use tower_http::cors;
use tower_http::cors::CorsLayer;

/// Cross origin request configuration.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Cors {
    /// Set to true to allow any origin.
    ///
    /// Defaults to false
    pub(crate) allow_any_origin: bool,

    /// The origin(s) to allow requests from.
    /// Defaults to `https://studio.apollographql.com/` for Apollo Studio.
    pub(crate) origins: Vec<String>,
}

impl Default for Cors {
    fn default() -> Self {
        Self::builder().build()
    }
}

fn default_origins() -> Vec<String> {
    vec!["https://studio.apollographql.com".into()]
}

#[buildstructor::buildstructor]
impl Cors {
    #[builder(visibility = "pub")]
    fn new(allow_any_origin: Option<bool>, origins: Option<Vec<String>>) -> Self {
        Self {
            allow_any_origin: allow_any_origin.unwrap_or_default(),
            origins: origins.unwrap_or_else(default_origins),
        }
    }
}

impl Cors {
    pub(crate) fn into_layer(self) -> Result<CorsLayer, String> {
        let cors = CorsLayer::new()
            .allow_headers(cors::AllowHeaders::mirror_request())
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

        if self.allow_any_origin {
            return Ok(cors.allow_origin(cors::Any));
        }
        let origins = self
            .origins
            .iter()
            .map(|origin| {
                origin
                    .parse::<HeaderValue>()
                    .map_err(|_| format!("origin '{}' is not valid", origin.escape_debug()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cors.allow_origin(cors::AllowOrigin::list(origins)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cors_allows_studio() {
        let cors = Cors::default();
        assert!(!cors.allow_any_origin);
        assert_eq!(cors.origins, vec!["https://studio.apollographql.com"]);
        assert!(cors.into_layer().is_ok());
    }

    #[test]
    fn invalid_origins_are_errors() {
        let error = Cors::builder()
            .origins(vec![
                String::from("https://ok.example.com"),
                String::from("not\nvalid"),
            ])
            .build()
            .into_layer()
            .unwrap_err();
        assert_eq!(error, "origin 'not\\nvalid' is not valid");
    }
}
