//! User gestures and the mutations they dispatch.

use serde_json::{Map, Value, json};

use super::{ComponentEnv, ComponentError, ComponentKind};
use crate::{
    Result,
    form::FormSubmission,
    mutation::names,
    reorder::ReorderRequest,
    services::{Confirmation, FormRequest},
    state::EntityId,
};

/// Something the user did to a component.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    /// Add a child: a category on the container, an item on a category
    Create,
    /// Open the entity's edit form
    Edit,
    /// Delete after confirmation
    Delete,
    ToggleActive,
    /// Drag-and-drop ended over a target
    Drop(ReorderRequest),
    /// Choose a room for the visibility filter; `None` shows all
    SelectRoom(Option<EntityId>),
    /// Choose a role for the visibility filter; `None` shows all
    SelectRole(Option<EntityId>),
}

impl Gesture {
    pub fn name(&self) -> &'static str {
        match self {
            Gesture::Create => "create",
            Gesture::Edit => "edit",
            Gesture::Delete => "delete",
            Gesture::ToggleActive => "toggleactive",
            Gesture::Drop(_) => "drop",
            Gesture::SelectRoom(_) => "selectroom",
            Gesture::SelectRole(_) => "selectrole",
        }
    }
}

fn unsupported(kind: ComponentKind, gesture: &Gesture) -> crate::Error {
    ComponentError::UnsupportedGesture {
        kind,
        gesture: gesture.name(),
    }
    .into()
}

pub(crate) async fn perform(
    env: &ComponentEnv,
    kind: ComponentKind,
    id: Option<EntityId>,
    gesture: Gesture,
) -> Result<bool> {
    let dispatcher = &env.dispatcher;
    let config = env.config();
    tracing::debug!(%kind, ?id, gesture = gesture.name(), "Handling gesture");

    match (&gesture, kind, id) {
        (Gesture::Create, ComponentKind::Container, _) => {
            let title = string(env, "addcategory").await?;
            edit_in_form(env, &config.forms.category, json!({}), title, &config.categories).await
        }
        (Gesture::Create, ComponentKind::Category, Some(id)) => {
            let title = string(env, "additem").await?;
            let mut args = Map::new();
            args.insert(config.foreign_key.clone(), json!(id));
            let args = Value::Object(args);
            edit_in_form(env, &config.forms.item, args, title, &config.items).await
        }
        (Gesture::Edit, ComponentKind::Category, Some(id)) => {
            let title = string(env, "editcategory").await?;
            let args = json!({"id": id});
            edit_in_form(env, &config.forms.category, args, title, &config.categories).await
        }
        (Gesture::Edit, ComponentKind::Item, Some(id)) => {
            let title = string(env, "edititem").await?;
            edit_in_form(env, &config.forms.item, json!({"id": id}), title, &config.items).await
        }
        (Gesture::Delete, ComponentKind::Category | ComponentKind::Item, Some(id)) => {
            let (message_key, mutation) = match kind {
                ComponentKind::Category => ("confirmdeletecategory", names::DELETE_CATEGORY),
                _ => ("confirmdeleteitem", names::DELETE_ITEM),
            };
            let confirmation = Confirmation {
                title: string(env, "delete").await?,
                message: string(env, message_key).await?,
                confirm_label: string(env, "delete").await?,
            };
            if !dispatcher.services().notifier.confirm(confirmation).await {
                tracing::debug!(%kind, id, "Delete cancelled");
                return Ok(false);
            }
            Ok(dispatcher.dispatch_reported(mutation, json!({"id": id})).await)
        }
        (Gesture::ToggleActive, ComponentKind::Category | ComponentKind::Item, Some(id)) => {
            let mutation = match kind {
                ComponentKind::Category => names::TOGGLE_CATEGORY_ACTIVE,
                _ => names::TOGGLE_ITEM_ACTIVE,
            };
            Ok(dispatcher.dispatch_reported(mutation, json!({"id": id})).await)
        }
        (Gesture::Drop(request), ComponentKind::Category | ComponentKind::Item, Some(_)) => {
            let mutation = match kind {
                ComponentKind::Category => names::REORDER_CATEGORIES,
                _ => names::REORDER_ITEMS,
            };
            let payload = serde_json::to_value(request)?;
            Ok(dispatcher.dispatch_reported(mutation, payload).await)
        }
        (Gesture::SelectRoom(room), _, _) => {
            Ok(dispatcher.dispatch_reported(names::SET_ACTIVE_ROOM, json!(room)).await)
        }
        (Gesture::SelectRole(role), _, _) => {
            Ok(dispatcher.dispatch_reported(names::SET_ACTIVE_ROLE, json!(role)).await)
        }
        _ => Err(unsupported(kind, &gesture)),
    }
}

async fn string(env: &ComponentEnv, key: &str) -> Result<String> {
    env.dispatcher
        .services()
        .strings
        .get_string(key, &env.config().component)
        .await
}

/// Open a modal form and apply what the server saved.
///
/// The form persists the entity itself; its result is applied locally through
/// the `processUpdates` mutation. Returns `false` if the user cancelled or the
/// result could not be applied.
async fn edit_in_form(
    env: &ComponentEnv,
    form_class: &str,
    args: Value,
    title: String,
    default_collection: &str,
) -> Result<bool> {
    let dispatcher = &env.dispatcher;
    let request = FormRequest {
        form_class: form_class.to_owned(),
        args,
        title,
    };
    let Some(payload) = dispatcher.services().forms.open(request).await? else {
        tracing::debug!(form = form_class, "Form cancelled");
        return Ok(false);
    };

    let updates = match FormSubmission::parse(payload)
        .and_then(|submission| submission.into_updates(default_collection))
    {
        Ok(updates) => updates,
        Err(err) => {
            let err = crate::Error::from(err);
            tracing::error!(form = form_class, error = %err, "Unusable form result");
            dispatcher.services().notifier.exception(&err).await;
            return Ok(false);
        }
    };
    let payload = serde_json::to_value(updates)?;
    Ok(dispatcher.dispatch_reported(names::PROCESS_UPDATES, payload).await)
}
