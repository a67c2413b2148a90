//! OpenAPI/Utoipa configuration.

use crate::api::health::MISC_TAG;
use crate::oauth2::OAUTH2_TAG;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, OAuth2, Scopes, SecurityScheme},
};

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    #[tracing::instrument(skip(self, openapi))]
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let bearer = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .description(Some(
                    "Opaque access token obtained from the `/oauth2/token` endpoint.",
                ))
                .build();
            components.add_security_scheme("bearer_auth", SecurityScheme::Http(bearer));

            // Scopes are registered per client, so none are listed here.
            let oauth2 = OAuth2::new([utoipa::openapi::security::Flow::AuthorizationCode(
                utoipa::openapi::security::AuthorizationCode::new(
                    "/oauth2/authorize",
                    "/oauth2/token",
                    Scopes::new(),
                ),
            )]);
            components.add_security_scheme("OAuth2", SecurityScheme::OAuth2(oauth2));
        }
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Sigel Auth API",
        version = "1.0.0",
        description = "OAuth2 identity provider for library collections and their permissions."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = OAUTH2_TAG, description = "OAuth2 authorization server endpoints")
    )
)]
pub struct ApiDoc;
