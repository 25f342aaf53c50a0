use super::store::EvaluationStore;
use crate::error::Result;
use crate::model::{
    api::auth::{Caller, Role},
    db::RequestListFilter,
    mongodb::Id,
};

/// Branches whose members may only filter the listing by certain related branches,
/// keyed by the member's own branch code.
const BRANCH_SCOPES: &[(&str, &[&str])] = &[("SB", &["SB", "İTA"])];

/// The branch codes a member of `branch_code` may filter by, if restricted.
pub fn allowed_branch_codes(branch_code: &str) -> Option<&'static [&'static str]> {
    BRANCH_SCOPES
        .iter()
        .find(|(code, _)| *code == branch_code)
        .map(|(_, allowed)| *allowed)
}

/// Work out which rows of the cross-question listing the caller may see.
///
/// Admins see everything, optionally narrowed to the requested branch.
/// Everyone else only sees their own requests; the requested branch is
/// honoured only for scoped branches, and only if it is one of the allowed ones.
pub async fn resolve_list_filter(
    store: &dyn EvaluationStore,
    caller: &Caller,
    branch_id: Option<Id>,
) -> Result<RequestListFilter> {
    if caller.is_an(Role::Admin) {
        return Ok(RequestListFilter {
            elector_id: None,
            lesson_id: branch_id,
        });
    }

    let mut filter = RequestListFilter {
        elector_id: Some(caller.id),
        lesson_id: None,
    };
    let allowed = caller.branch_code.as_deref().and_then(allowed_branch_codes);
    if let (Some(allowed), Some(branch_id)) = (allowed, branch_id) {
        let allowed_ids = store.branch_ids_with_codes(allowed).await?;
        if allowed_ids.contains(&branch_id) {
            filter.lesson_id = Some(branch_id);
        }
    }
    Ok(filter)
}
