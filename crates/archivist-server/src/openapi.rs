use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Archivist API",
        version = "0.1.0",
        description = "Keeps Wayback Machine snapshots for the links referenced by content entries."
    ),
    paths(
        crate::routes::archive_task,
        crate::routes::put_entry,
        crate::routes::get_entry,
        crate::routes::list_tasks,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::ArchiveTaskPayload,
        crate::dto::ArchiveOutcomeResponse,
        crate::dto::LinkDto,
        crate::dto::EntryRequest,
        crate::dto::EntryResponse,
        crate::dto::PutEntryResponse,
        crate::dto::TaskResponse,
        crate::dto::TaskListResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "archive", description = "Archive task consumer"),
        (name = "entries", description = "Entry writes and archive dispatch"),
        (name = "tasks", description = "Archive task queue"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds Bearer token security scheme to the OpenAPI document.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("token")
                        .description(Some(
                            "API key. Set via ARCHIVIST_API_KEY environment variable.",
                        ))
                        .build(),
                ),
            );
        }
    }
}
