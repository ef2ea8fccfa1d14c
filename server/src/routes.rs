use std::sync::Arc;

use actix_web::{post, web, HttpResponse, Responder};
use shared::interaction::{
    DifficultyQuery, RestfulError, RestfulResponse, ScoreQuery, TargetContext, ValidatePow,
};
use tracing::trace;

use crate::restful::{IntoRestfulError, RESTful};

#[post("/api/v1/validate")]
pub(crate) async fn validate(
    web::Json(payload): web::Json<ValidatePow>,
    api: web::Data<Arc<RESTful>>,
) -> Result<impl Responder, RestfulError> {
    trace!("/api/v1/validate");
    let resp = api.validate_pow(payload).await.map_err(|err| err.into_restful_error())?;
    Ok(HttpResponse::Ok().json(RestfulResponse::success(resp)))
}

#[post("/api/v1/target")]
pub(crate) async fn target(
    web::Json(context): web::Json<TargetContext>,
    api: web::Data<Arc<RESTful>>,
) -> Result<impl Responder, RestfulError> {
    trace!("/api/v1/target");
    api.upsert_target(context).await.map_err(|err| err.into_restful_error())?;
    Ok(HttpResponse::Ok().json(RestfulResponse::success(())))
}

#[post("/api/v1/difficulty")]
pub(crate) async fn difficulty(
    web::Json(query): web::Json<DifficultyQuery>,
    api: web::Data<Arc<RESTful>>,
) -> Result<impl Responder, RestfulError> {
    trace!("/api/v1/difficulty");
    let resp = api.peek_difficulty(query.target).await.map_err(|err| err.into_restful_error())?;
    Ok(HttpResponse::Ok().json(RestfulResponse::success(resp)))
}

#[post("/api/v1/score")]
pub(crate) async fn score(
    web::Json(query): web::Json<ScoreQuery>,
    api: web::Data<Arc<RESTful>>,
) -> Result<impl Responder, RestfulError> {
    trace!("/api/v1/score");
    let resp = api.fetch_score(query.user_id).await.map_err(|err| err.into_restful_error())?;
    Ok(HttpResponse::Ok().json(RestfulResponse::success(resp)))
}
