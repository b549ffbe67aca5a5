use super::handlers::{applicants, auth, favorites, health, users};
use utoipa::openapi::{InfoBuilder, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec. Handlers sharing a path must
/// share one `routes!` call. Routes added outside (like `/`) are intentionally
/// not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    let router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::signup::signup))
        .routes(routes!(auth::signup::verify_otp))
        .routes(routes!(auth::signup::resend_otp))
        .routes(routes!(auth::login::signin))
        .routes(routes!(auth::login::signin_email))
        .routes(routes!(auth::google::google_signin))
        .routes(routes!(auth::password_reset::forgot_password))
        .routes(routes!(auth::password_reset::reset_password))
        .routes(routes!(users::get_user, users::update_user))
        .routes(routes!(users::update_location))
        .routes(routes!(users::change_password))
        .routes(routes!(favorites::add_favorite, favorites::list_favorites))
        .routes(routes!(favorites::remove_favorite))
        .routes(routes!(
            applicants::list_applicants,
            applicants::create_applicant
        ))
        .routes(routes!(
            applicants::get_applicant,
            applicants::update_applicant,
            applicants::delete_applicant
        ));

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(Some(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Signup, OTP verification, and sign-in".to_string());

    let mut users_tag = Tag::new("users");
    users_tag.description = Some("Self-scoped profile and favorites management".to_string());

    let mut directory_tag = Tag::new("directory");
    directory_tag.description = Some("Provider directory entries".to_string());

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Service liveness".to_string());

    OpenApiBuilder::new()
        .info(info)
        .tags(Some(vec![auth_tag, users_tag, directory_tag, health_tag]))
        .build()
}
