use utoipa::OpenApi;

#[derive(OpenApi)]
/// OpenAPI document of the authoring bot backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::webhook::receive_update,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::telegram::Update,
            crate::dto::telegram::Message,
            crate::dto::telegram::User,
            crate::dto::telegram::Chat,
            crate::dto::telegram::PhotoSize,
            crate::dto::telegram::CallbackQuery,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "bot", description = "Chat platform webhook"),
    )
)]
pub struct ApiDoc;
