//! Interactive record wizards.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use crmdesk_core::client::RestRecordStore;
use crmdesk_core::config::CrmConfig;
use crmdesk_core::wizard::{deal_wizard, lead_wizard, StepDef, Wizard, WizardMode, WizardSchema, WizardSeed};
use crmdesk_core::{EntityKind, FieldValue, RecordStore, SubmitError};
use dialoguer::{Confirm, Input, Select};

use super::{draft_store, pipeline::load_collection};
use crate::output;

const NUMERIC_FIELDS: [&str; 7] = [
    "estimatedValue",
    "amount",
    "probability",
    "platformFee",
    "customFee",
    "licenseFee",
    "onboardingFee",
];

#[derive(Subcommand)]
pub enum WizardCommands {
    /// Create a record step by step, resuming a saved draft
    New(NewArgs),

    /// Edit an existing record through the same steps
    Edit(EditArgs),
}

#[derive(Args)]
pub struct NewArgs {
    /// Ignore and remove any saved draft
    #[arg(long)]
    pub fresh: bool,
}

#[derive(Args)]
pub struct EditArgs {
    /// Record ID
    pub record_id: String,
}

/// Wizard schema for an entity, if it has one.
pub fn schema_for(kind: EntityKind) -> Option<WizardSchema> {
    match kind {
        EntityKind::Lead => Some(lead_wizard()),
        EntityKind::Deal => Some(deal_wizard()),
        EntityKind::Account | EntityKind::Contact => None,
    }
}

enum StepAction {
    Next,
    Back,
    Leave,
    Discard,
}

pub async fn execute(cmd: WizardCommands, kind: EntityKind, config: &CrmConfig) -> Result<()> {
    let Some(schema) = schema_for(kind) else {
        bail!("There is no wizard for {kind}");
    };
    let drafts = draft_store(config).await;

    match cmd {
        WizardCommands::New(args) => {
            let store = RestRecordStore::from_config(&config.api);
            let mut wizard = Wizard::new(schema, WizardMode::Create, drafts)
                .with_namespace(&config.drafts.namespace)
                .with_autosave(config.drafts.debounce());

            wizard.initialize(None).await;
            if wizard.schema().has_user_content(wizard.draft()) {
                let resume = !args.fresh
                    && Confirm::new()
                        .with_prompt(format!("A saved {kind} draft exists. Resume it?"))
                        .default(true)
                        .interact()
                        .context("Failed to read confirmation")?;
                if !resume {
                    wizard.discard().await;
                }
            }

            run(&mut wizard, &store).await
        }

        WizardCommands::Edit(args) => {
            let (store, collection) = load_collection(kind, config).await?;
            let snapshot = collection.snapshot();
            let Some(record) = snapshot.iter().find(|r| r.id == args.record_id) else {
                bail!("{kind} {} not found", args.record_id);
            };

            let mut wizard = Wizard::new(
                schema,
                WizardMode::Edit {
                    record_id: record.id.clone(),
                },
                drafts,
            );
            wizard.initialize(Some(WizardSeed::from(record))).await;

            run(&mut wizard, store.as_ref()).await
        }
    }
}

async fn run(wizard: &mut Wizard, store: &dyn RecordStore) -> Result<()> {
    loop {
        let Some(step) = wizard.current_step_def().cloned() else {
            bail!("Wizard has no step {}", wizard.current_step());
        };
        output::print_step_header(wizard, &step);
        prompt_step(wizard, &step)?;

        match choose_action(wizard)? {
            StepAction::Next if wizard.is_last_step() => {
                let spinner = output::spinner("Saving...");
                let result = wizard.submit(store).await;
                spinner.finish_and_clear();
                match result {
                    Ok(record) => {
                        println!(
                            "{} Saved {}: {} ({})",
                            "✓".green().bold(),
                            record.kind,
                            record.display_name().cyan(),
                            record.id.dimmed()
                        );
                        return Ok(());
                    }
                    Err(SubmitError::Invalid { errors, .. }) => output::print_field_errors(&errors),
                    Err(e) => println!("{} {}; your answers are kept", "✗".red().bold(), e),
                }
            }
            StepAction::Next => {
                if !wizard.advance() {
                    output::print_field_errors(&wizard.draft().errors);
                }
            }
            StepAction::Back => wizard.retreat(),
            StepAction::Leave => {
                wizard.flush_draft().await;
                if wizard.mode().is_create() {
                    println!("{} Draft saved to {}", "✓".green().bold(), wizard.draft_key().dimmed());
                }
                return Ok(());
            }
            StepAction::Discard => {
                wizard.discard().await;
                println!("{}", "Draft discarded.".dimmed());
                return Ok(());
            }
        }
    }
}

fn choose_action(wizard: &Wizard) -> Result<StepAction> {
    let mut items = vec![if wizard.is_last_step() { "Submit" } else { "Next" }];
    let mut actions = vec![StepAction::Next];
    if wizard.current_step() > 0 {
        items.push("Back");
        actions.push(StepAction::Back);
    }
    if wizard.mode().is_create() {
        items.push("Save draft and exit");
        actions.push(StepAction::Leave);
        items.push("Discard draft");
        actions.push(StepAction::Discard);
    } else {
        items.push("Cancel");
        actions.push(StepAction::Leave);
    }

    let choice = Select::new()
        .with_prompt("Continue")
        .items(&items)
        .default(0)
        .interact()
        .context("Failed to read choice")?;

    actions
        .into_iter()
        .nth(choice)
        .context("Choice out of range")
}

fn prompt_step(wizard: &mut Wizard, step: &StepDef) -> Result<()> {
    for field in &step.fields {
        match field.as_str() {
            "attachments" => println!("  {}", "Attachments are uploaded from the web app.".dimmed()),
            "tags" => prompt_tags(wizard)?,
            "customFields" => prompt_custom_fields(wizard)?,
            "plannedActivities" => prompt_list(wizard, field)?,
            _ => prompt_value(wizard, step, field)?,
        }
    }
    Ok(())
}

fn prompt_value(wizard: &mut Wizard, step: &StepDef, field: &str) -> Result<()> {
    let current = wizard
        .draft()
        .field(field)
        .map(FieldValue::display)
        .unwrap_or_default();
    let required = step
        .rules
        .iter()
        .any(|r| r.field == field && r.required.is_some());
    let mut prompt = output::field_label(field);
    if required {
        prompt.push_str(" *");
    }
    if let Some(message) = wizard.draft().errors.get(field) {
        println!("  {} {}", "!".red().bold(), message.red());
    }

    let input: String = Input::new()
        .with_prompt(prompt)
        .with_initial_text(current.clone())
        .allow_empty(true)
        .interact_text()
        .with_context(|| format!("Failed to read {field}"))?;
    let input = input.trim();

    if input == current {
        return Ok(());
    }
    if input.is_empty() {
        wizard.clear_field(field);
    } else if NUMERIC_FIELDS.contains(&field) {
        match input.parse::<f64>() {
            Ok(n) => wizard.set_field(field, n),
            Err(_) => wizard.set_field(field, input),
        }
    } else {
        wizard.set_field(field, input);
    }
    Ok(())
}

fn prompt_tags(wizard: &mut Wizard) -> Result<()> {
    if !wizard.draft().tags.is_empty() {
        println!("  {} {}", "Tags:".bold(), wizard.draft().tags.join(", "));
    }
    let input: String = Input::new()
        .with_prompt("Tags (comma-separated, -tag removes)")
        .allow_empty(true)
        .interact_text()
        .context("Failed to read tags")?;

    for token in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if let Some(tag) = token.strip_prefix('-') {
            wizard.remove_tag(tag.trim());
        } else if let Err(e) = wizard.add_tag(token) {
            println!("  {} {}", "!".yellow().bold(), e);
        }
    }
    Ok(())
}

fn prompt_custom_fields(wizard: &mut Wizard) -> Result<()> {
    for (name, value) in &wizard.draft().custom_fields {
        println!("  {} {} = {}", "•".dimmed(), name, value);
    }
    loop {
        let input: String = Input::new()
            .with_prompt("Custom field name=value (-name removes, empty to finish)")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read custom field")?;
        let input = input.trim();
        if input.is_empty() {
            return Ok(());
        }

        if let Some(name) = input.strip_prefix('-') {
            wizard.remove_custom_field(name.trim());
            continue;
        }
        let (name, value) = input.split_once('=').unwrap_or((input, ""));
        if let Err(e) = wizard.add_custom_field(name, value) {
            println!("  {} {}", "!".yellow().bold(), e);
        }
    }
}

fn prompt_list(wizard: &mut Wizard, field: &str) -> Result<()> {
    let current = match wizard.draft().field(field) {
        Some(FieldValue::List(items)) => items.join(", "),
        _ => String::new(),
    };
    let input: String = Input::new()
        .with_prompt(format!("{} (comma-separated)", output::field_label(field)))
        .with_initial_text(current.clone())
        .allow_empty(true)
        .interact_text()
        .with_context(|| format!("Failed to read {field}"))?;

    if input.trim() == current {
        return Ok(());
    }
    let items: Vec<String> = input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        wizard.clear_field(field);
    } else {
        wizard.set_field(field, items);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_lead_and_deal_have_wizards() {
        assert!(schema_for(EntityKind::Lead).is_some());
        assert!(schema_for(EntityKind::Deal).is_some());
        assert!(schema_for(EntityKind::Account).is_none());
        assert!(schema_for(EntityKind::Contact).is_none());
    }

    #[test]
    fn test_numeric_fields_exist_in_schemas() {
        let fields: Vec<String> = [lead_wizard(), deal_wizard()]
            .iter()
            .flat_map(|s| s.steps.iter().flat_map(|step| step.fields.clone()))
            .collect();
        for field in NUMERIC_FIELDS {
            assert!(fields.iter().any(|f| f == field), "{field} is not a wizard field");
        }
    }
}
