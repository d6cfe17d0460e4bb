use std::sync::Arc;

use actix_web::{web, HttpResponse};
use log::debug;

use crate::auth::MaybeAuth;
use crate::dispatch::Dispatcher;
use crate::error::ApiError;
use crate::models::DispatchRequest;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1").service(
            web::resource("/notifications").route(web::post().to(dispatch_notification)),
        ),
    );
}

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct DispatchResponse {
    /// Messages the transport accepted; zero is a normal outcome.
    pub sent: usize,
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications",
    request_body = DispatchRequest,
    responses(
        (status = 200, description = "Dispatch completed", body = DispatchResponse),
        (status = 400, description = "Malformed payload"),
        (status = 401, description = "Authorization header present but invalid"),
        (status = 500, description = "Post not found or internal failure")
    )
)]
pub async fn dispatch_notification(
    auth: MaybeAuth,
    data: web::Data<AppState>,
    payload: web::Json<DispatchRequest>,
) -> Result<HttpResponse, ApiError> {
    if let Some(claims) = auth.0 {
        debug!("dispatch requested by {}", claims.sub);
    }
    let summary = data.dispatcher.dispatch(payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(DispatchResponse { sent: summary.sent }))
}
