use crate::models::{DispatchRequest, EventType};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::dispatch_notification,
    ),
    components(schemas(
        DispatchRequest, EventType, crate::routes::DispatchResponse
    )),
    tags(
        (name = "notifications", description = "Event fan-out to email")
    )
)]
pub struct ApiDoc;
