//! Generic create/update/delete execution
//!
//! Every mutation resolves to a [`MutationResult`] envelope: not-found ids,
//! bad input and failed commits are reported as `ok: false` with a message
//! instead of GraphQL errors.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use super::assign::{InputTree, assign};
use super::global_id::decode_lenient;
use super::types::TypeNames;
use crate::db::Database;
use crate::orm::{Instance, ModelCatalog, ModelDef, Record, Session};

pub const SUCCESS_MESSAGE: &str = "operation succeeded";
pub const NOT_FOUND_MESSAGE: &str = "record not found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationAction {
    Create,
    Update,
    Delete,
}

impl MutationAction {
    pub const ALL: [MutationAction; 3] = [
        MutationAction::Create,
        MutationAction::Update,
        MutationAction::Delete,
    ];

    /// Root mutation field name, e.g. `createUser`
    pub fn field_name(&self, model: &str) -> String {
        let verb = match self {
            MutationAction::Create => "create",
            MutationAction::Update => "update",
            MutationAction::Delete => "delete",
        };
        format!("{verb}{model}")
    }
}

/// Outcome envelope of a mutation
#[derive(Debug, Clone)]
pub struct MutationResult {
    pub output: Option<Record>,
    pub ok: bool,
    pub message: String,
}

impl MutationResult {
    pub fn success(output: Option<Record>) -> Self {
        Self {
            output,
            ok: true,
            message: SUCCESS_MESSAGE.to_string(),
        }
    }

    pub fn not_found() -> Self {
        Self::failure(NOT_FOUND_MESSAGE.to_string())
    }

    pub fn operation_error(detail: impl std::fmt::Display) -> Self {
        Self::failure(format!("operation error: {detail}"))
    }

    pub fn invalid_input(detail: impl std::fmt::Display) -> Self {
        Self::failure(format!("invalid input: {detail}"))
    }

    fn failure(message: String) -> Self {
        Self {
            output: None,
            ok: false,
            message,
        }
    }
}

/// Raw mutation arguments, handed to hooks unchanged
#[derive(Debug, Clone)]
pub struct MutationArgs {
    pub action: MutationAction,
    pub id: Option<String>,
    pub input: Option<JsonValue>,
}

/// Side-effect hooks around a model's mutation commit.
///
/// `before_commit` runs after the input has been applied, right before the
/// instance is staged; `after_commit` runs only when the commit succeeded.
#[async_trait]
pub trait MutationHooks: Send + Sync {
    async fn before_commit(
        &self,
        _session: &mut Session,
        _instance: &mut Instance,
        _args: &MutationArgs,
    ) {
    }

    async fn after_commit(&self, _session: &mut Session, _instance: &Instance, _args: &MutationArgs) {
    }
}

/// Runs mutations for any catalog model
#[derive(Clone)]
pub struct MutationExecutor {
    catalog: Arc<ModelCatalog>,
    hooks: HashMap<String, Arc<dyn MutationHooks>>,
    max_assign_depth: usize,
}

impl MutationExecutor {
    pub fn new(catalog: Arc<ModelCatalog>) -> Self {
        Self {
            catalog,
            hooks: HashMap::new(),
            max_assign_depth: 8,
        }
    }

    pub fn with_hooks(mut self, model: impl Into<String>, hooks: Arc<dyn MutationHooks>) -> Self {
        self.hooks.insert(model.into(), hooks);
        self
    }

    pub fn with_max_assign_depth(mut self, depth: usize) -> Self {
        self.max_assign_depth = depth;
        self
    }

    pub fn catalog(&self) -> &Arc<ModelCatalog> {
        &self.catalog
    }

    pub async fn execute(
        &self,
        db: &Database,
        model: &Arc<ModelDef>,
        args: MutationArgs,
    ) -> MutationResult {
        let mut session = db.session();
        let output_type = TypeNames::for_name(&model.name).output();

        let existing = match (args.action, &args.id) {
            (MutationAction::Create, _) => None,
            (_, None) => return MutationResult::invalid_input("id is required"),
            (_, Some(raw)) => {
                let id = match decode_lenient(&output_type, raw) {
                    Ok(id) => id,
                    Err(e) => return MutationResult::invalid_input(e),
                };
                match session.get(model, id).await {
                    Ok(Some(record)) => Some(record),
                    Ok(None) => return MutationResult::not_found(),
                    Err(e) => return MutationResult::operation_error(e),
                }
            }
        };

        let mut instance = match &existing {
            Some(record) => match record.primary_key() {
                Some(pk) => Instance::existing(Arc::clone(model), pk),
                None => return MutationResult::not_found(),
            },
            None => Instance::new(Arc::clone(model)),
        };

        if args.action != MutationAction::Delete {
            let input = args
                .input
                .clone()
                .unwrap_or_else(|| JsonValue::Object(Default::default()));
            let applied = InputTree::parse(&self.catalog, model, &input, self.max_assign_depth)
                .and_then(|tree| {
                    assign(&mut instance, &tree, &self.catalog, self.max_assign_depth)
                });
            if let Err(e) = applied {
                return MutationResult::invalid_input(e);
            }
        }

        let hooks = self.hooks.get(&model.name).cloned();
        if let Some(hooks) = &hooks {
            hooks.before_commit(&mut session, &mut instance, &args).await;
        }

        let staged = match args.action {
            MutationAction::Delete => match instance.primary_key() {
                Some(pk) => session.delete(Arc::clone(model), pk),
                None => {
                    session.rollback();
                    return MutationResult::not_found();
                }
            },
            _ => session.add(instance.clone()),
        };

        let receipt = match session.commit().await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(model = %model.name, action = ?args.action, error = %e, "Mutation commit failed");
                return MutationResult::operation_error(e);
            }
        };

        let output = match args.action {
            MutationAction::Delete => existing,
            _ => match receipt.key(staged) {
                Some(pk) => match session.get(model, pk).await {
                    Ok(record) => record,
                    Err(e) => return MutationResult::operation_error(e),
                },
                None => None,
            },
        };

        if let (true, Some(pk)) = (instance.is_new(), receipt.key(staged)) {
            instance.set_primary_key(pk);
        }
        info!(model = %model.name, action = ?args.action, "Mutation committed");

        if let Some(hooks) = &hooks {
            hooks.after_commit(&mut session, &instance, &args).await;
        }

        MutationResult::success(output)
    }
}
