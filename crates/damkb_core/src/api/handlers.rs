//! Resource handlers: decode, delegate to a service, encode.

use crate::api::codec::{
    decode_new_class, decode_new_object, encode_class, encode_object, parse_json_body,
};
use crate::api::{ApiError, ApiRequest, ApiResult};
use crate::service::class_service::ClassService;
use crate::service::object_service::ObjectService;
use crate::service::Requester;
use crate::session::KbSession;
use serde_json::{json, Map as JsonMap, Value as JsonValue};

/// Query parameter filtering the objects collection by class.
pub const CLASS_FILTER_PARAM: &str = "class";

/// Everything a handler may touch during one call.
pub struct HandlerContext<'a, 'conn> {
    pub session: &'a KbSession<'conn>,
    pub requester: &'a Requester,
    pub request: &'a ApiRequest,
    /// Class or object id from the path, for item routes.
    pub target: Option<&'a str>,
}

impl HandlerContext<'_, '_> {
    fn json_body(&self) -> ApiResult<JsonMap<String, JsonValue>> {
        parse_json_body(self.request.content_type.as_deref(), &self.request.body)
    }

    fn target_id(&self) -> ApiResult<&str> {
        self.target
            .ok_or_else(|| ApiError::RouteNotFound(self.request.path.clone()))
    }
}

pub type Handler = fn(&HandlerContext<'_, '_>) -> ApiResult<JsonValue>;

fn updated() -> JsonValue {
    json!({"status": "ok"})
}

pub fn list_classes(ctx: &HandlerContext<'_, '_>) -> ApiResult<JsonValue> {
    let (classes, workspaces) = (ctx.session.classes(), ctx.session.workspaces());
    let chains = ClassService::new(&classes, &workspaces).list_classes(ctx.requester.workspace)?;
    Ok(JsonValue::Array(chains.iter().map(encode_class).collect()))
}

pub fn create_class(ctx: &HandlerContext<'_, '_>) -> ApiResult<JsonValue> {
    let new_class = decode_new_class(&ctx.json_body()?)?;
    let (classes, workspaces) = (ctx.session.classes(), ctx.session.workspaces());
    let id = ClassService::new(&classes, &workspaces).create_class(new_class, ctx.requester)?;
    Ok(json!({"id": id}))
}

pub fn get_class(ctx: &HandlerContext<'_, '_>) -> ApiResult<JsonValue> {
    let class_id = ctx.target_id()?;
    let (classes, workspaces) = (ctx.session.classes(), ctx.session.workspaces());
    let chain = ClassService::new(&classes, &workspaces).get_class(class_id, ctx.requester.workspace)?;
    Ok(encode_class(&chain))
}

pub fn update_class(ctx: &HandlerContext<'_, '_>) -> ApiResult<JsonValue> {
    let class_id = ctx.target_id()?;
    let patch = ctx.json_body()?;
    let (classes, workspaces) = (ctx.session.classes(), ctx.session.workspaces());
    ClassService::new(&classes, &workspaces).update_class(class_id, &patch, ctx.requester)?;
    Ok(updated())
}

pub fn list_class_objects(ctx: &HandlerContext<'_, '_>) -> ApiResult<JsonValue> {
    let class_id = ctx.target_id()?;
    list_objects_of(ctx, Some(class_id))
}

pub fn list_objects(ctx: &HandlerContext<'_, '_>) -> ApiResult<JsonValue> {
    let filter = ctx.request.query.get(CLASS_FILTER_PARAM).map(String::as_str);
    list_objects_of(ctx, filter)
}

fn list_objects_of(ctx: &HandlerContext<'_, '_>, class_filter: Option<&str>) -> ApiResult<JsonValue> {
    let (classes, objects) = (ctx.session.classes(), ctx.session.objects());
    let found =
        ObjectService::new(&classes, &objects).list_objects(ctx.requester.workspace, class_filter)?;
    Ok(JsonValue::Array(found.iter().map(encode_object).collect()))
}

pub fn create_object(ctx: &HandlerContext<'_, '_>) -> ApiResult<JsonValue> {
    let new_object = decode_new_object(&ctx.json_body()?)?;
    let (classes, objects) = (ctx.session.classes(), ctx.session.objects());
    let id = ObjectService::new(&classes, &objects).create_object(new_object, ctx.requester)?;
    Ok(json!({"id": id}))
}

pub fn get_object(ctx: &HandlerContext<'_, '_>) -> ApiResult<JsonValue> {
    let object_id = ctx.target_id()?;
    let (classes, objects) = (ctx.session.classes(), ctx.session.objects());
    let object =
        ObjectService::new(&classes, &objects).get_object(object_id, ctx.requester.workspace)?;
    Ok(encode_object(&object))
}

pub fn update_object(ctx: &HandlerContext<'_, '_>) -> ApiResult<JsonValue> {
    let object_id = ctx.target_id()?;
    let patch = ctx.json_body()?;
    let (classes, objects) = (ctx.session.classes(), ctx.session.objects());
    ObjectService::new(&classes, &objects).update_object(object_id, &patch, ctx.requester)?;
    Ok(updated())
}
