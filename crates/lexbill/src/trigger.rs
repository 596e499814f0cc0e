// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lexbill trigger` command implementation: review and edit the trigger queue.

use lexbill_config::LexbillConfig;
use lexbill_core::LexbillError;
use lexbill_sweep::{ActionItemEdit, TriggerService};

use crate::TriggerCommand;
use crate::app::App;
use crate::sweep::{print_json, to_json};

pub async fn run_trigger(
    config: &LexbillConfig,
    command: TriggerCommand,
) -> Result<(), LexbillError> {
    let app = App::open(config).await?;
    let service = TriggerService::new(app.db.clone());

    let outcome = dispatch(&service, command).await;

    app.close().await?;
    print_json(&outcome?)
}

async fn dispatch(
    service: &TriggerService,
    command: TriggerCommand,
) -> Result<serde_json::Value, LexbillError> {
    match command {
        TriggerCommand::List { status, limit } => {
            to_json(service.list_triggers(status, limit).await?)
        }
        TriggerCommand::Actions { status } => to_json(service.list_action_items(status).await?),
        TriggerCommand::Confirm { id, user } => to_json(service.confirm(id, user).await?),
        TriggerCommand::Reject { id, user } => to_json(service.reject(id, user).await?),
        TriggerCommand::UpdateAction {
            id,
            action_type,
            description,
            due_date,
            status,
            assign,
        } => {
            let edit = ActionItemEdit {
                action_type,
                description,
                due_date,
                status,
                assigned_to: assign,
            };
            to_json(service.update_action_item(id, &edit).await?)
        }
        TriggerCommand::StatusChange { project_id, status } => {
            to_json(service.record_status_change(project_id, &status).await?)
        }
    }
}
