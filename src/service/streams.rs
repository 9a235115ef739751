use super::{load_stream, require_admin};
use crate::actions;
use crate::context::RequestContext;
use crate::db::{DbStream, UnitOfWork};
use crate::error::SubcastError;
use crate::events::EventDispatcher;

/// `DELETE /streams/{id}`.
pub async fn deactivate(
    uow: &mut UnitOfWork,
    dispatcher: &EventDispatcher,
    ctx: &RequestContext,
    stream_id: i64,
) -> Result<DbStream, SubcastError> {
    require_admin(ctx)?;
    let stream = load_stream(uow.conn(), ctx, stream_id, true).await?;
    actions::deactivate_stream(uow, dispatcher, &stream, Some(&ctx.user)).await
}

/// `POST /streams/{id}/reactivate`.
pub async fn reactivate(
    uow: &mut UnitOfWork,
    dispatcher: &EventDispatcher,
    ctx: &RequestContext,
    stream_id: i64,
    new_name: &str,
) -> Result<DbStream, SubcastError> {
    require_admin(ctx)?;
    let stream = load_stream(uow.conn(), ctx, stream_id, true).await?;
    actions::reactivate_stream(uow, dispatcher, &stream, new_name, Some(&ctx.user)).await
}
