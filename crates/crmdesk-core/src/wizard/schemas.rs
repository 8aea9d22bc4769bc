//! Built-in Lead and Deal wizards.

use crate::record::{EntityKind, FieldMap, FieldValue, NewRecord};

use super::model::{CrossFieldRule, FieldRule, Format, StepDef, WizardDraft, WizardSchema};

const FEE_FIELDS: [&str; 4] = ["platformFee", "customFee", "licenseFee", "onboardingFee"];

/// Four-step lead capture: identity, company, qualification, notes.
pub fn lead_wizard() -> WizardSchema {
    let steps = vec![
        StepDef::new("basic", "Basic Details")
            .describe("Contact information and identity")
            .fields(&["firstName", "lastName", "email", "mobilePhone", "workPhone"])
            .rule(FieldRule::new("firstName").required("First name is required"))
            .rule(FieldRule::new("lastName").required("Last name is required"))
            .rule(
                FieldRule::new("email")
                    .required("Email is required")
                    .format(Format::Email, "Please enter a valid email address"),
            )
            .rule(FieldRule::new("mobilePhone").format(Format::Phone, "Please enter a valid phone number"))
            .rule(FieldRule::new("workPhone").format(Format::Phone, "Please enter a valid phone number")),
        StepDef::new("company", "Company & Role")
            .describe("Professional information")
            .fields(&["company", "title", "industry"])
            .rule(FieldRule::new("company").required("Company name is required")),
        StepDef::new("qualification", "Lead Qualification")
            .describe("Sales and opportunity details")
            .fields(&["source", "status", "priority", "assignedTo", "estimatedValue", "nextFollowUp"]),
        StepDef::new("additional", "Additional Details")
            .describe("Notes, tags, and attachments")
            .fields(&["notes", "tags", "customFields", "attachments"]),
    ];

    let mut defaults = FieldMap::new();
    defaults.insert("status".into(), FieldValue::text("new"));
    defaults.insert("priority".into(), FieldValue::text("medium"));

    WizardSchema {
        kind: EntityKind::Lead,
        steps,
        defaults,
        transform: lead_record,
    }
}

fn lead_record(draft: &WizardDraft) -> NewRecord {
    let name = format!("{} {}", draft.text("firstName"), draft.text("lastName"));
    let phone = draft
        .non_blank("mobilePhone")
        .or_else(|| draft.non_blank("workPhone"))
        .unwrap_or("");

    let mut record = NewRecord::new(EntityKind::Lead)
        .with_field("name", name.trim())
        .with_field("email", draft.text("email"))
        .with_field("phone", phone)
        .with_field("estimatedValue", draft.number("estimatedValue").unwrap_or(0.0))
        .with_field("status", draft.non_blank("status").unwrap_or("new"));

    for field in [
        "firstName",
        "lastName",
        "company",
        "title",
        "industry",
        "source",
        "priority",
        "assignedTo",
        "nextFollowUp",
        "notes",
    ] {
        if let Some(text) = draft.non_blank(field) {
            record.fields.insert(field.to_string(), FieldValue::text(text));
        }
    }

    record.tags = draft.tags.clone();
    record.custom_fields = draft.custom_fields.clone();
    record
}

/// Five-step deal creation: ownership, basics, financials, activities,
/// attachments.
pub fn deal_wizard() -> WizardSchema {
    let steps = vec![
        StepDef::new("ownership", "Ownership & Classification")
            .fields(&["ownerId", "dealType", "country"])
            .rule(FieldRule::new("ownerId").required("Deal owner is required"))
            .rule(FieldRule::new("dealType").required("Deal type is required"))
            .rule(FieldRule::new("country").required("Country is required")),
        StepDef::new("basic", "Basic Information")
            .fields(&[
                "name",
                "pipelineId",
                "accountId",
                "contactId",
                "amount",
                "currency",
                "closingDate",
                "stageId",
                "probability",
            ])
            .rule(FieldRule::new("name").required("Deal name is required"))
            .rule(FieldRule::new("pipelineId").required("Pipeline is required"))
            .rule(FieldRule::new("amount").greater_than(0.0, "Amount must be greater than 0")),
        StepDef::new("financial", "Financial Details")
            .fields(&FEE_FIELDS)
            .check(CrossFieldRule::new("totalFees", fees_match_amount)),
        StepDef::new("activities", "Activity Planning").fields(&["plannedActivities", "nextSteps"]),
        StepDef::new("attachments", "Attachments").fields(&["attachments", "description", "tags"]),
    ];

    let mut defaults = FieldMap::new();
    for (field, value) in [
        ("ownerId", "1"),
        ("dealType", "new-business"),
        ("country", "US"),
        ("pipelineId", "default-pipeline"),
        ("currency", "USD"),
        ("stageId", "qualification"),
    ] {
        defaults.insert(field.into(), FieldValue::text(value));
    }
    defaults.insert("probability".into(), FieldValue::Number(10.0));

    WizardSchema {
        kind: EntityKind::Deal,
        steps,
        defaults,
        transform: deal_record,
    }
}

// Fees are optional; once any is entered they must add up to the amount.
fn fees_match_amount(draft: &WizardDraft) -> Option<String> {
    let fees: Vec<f64> = FEE_FIELDS.iter().filter_map(|f| draft.number(f)).collect();
    if fees.iter().all(|f| *f == 0.0) {
        return None;
    }
    let total: f64 = fees.iter().sum();
    let amount = draft.number("amount").unwrap_or(0.0);
    if (total - amount).abs() < 0.005 {
        None
    } else {
        Some("Total fees must equal deal amount".to_string())
    }
}

fn deal_record(draft: &WizardDraft) -> NewRecord {
    let name = draft.non_blank("name").unwrap_or("Untitled Deal");
    let stage = draft.non_blank("stageId").unwrap_or("qualification");

    let mut record = NewRecord::new(EntityKind::Deal)
        .with_stage(stage)
        .with_field("title", name)
        .with_field("name", name)
        .with_field("value", draft.number("amount").unwrap_or(0.0))
        .with_field(
            "probability",
            draft.number("probability").filter(|p| *p > 0.0).unwrap_or(10.0),
        )
        .with_field("assignedTo", draft.non_blank("ownerId").unwrap_or("1"));

    for (from, to) in [
        ("contactId", "leadId"),
        ("closingDate", "expectedCloseDate"),
        ("description", "notes"),
        ("accountId", "accountId"),
        ("dealType", "dealType"),
        ("country", "country"),
        ("pipelineId", "pipelineId"),
        ("currency", "currency"),
        ("nextSteps", "nextSteps"),
    ] {
        if let Some(text) = draft.non_blank(from) {
            record.fields.insert(to.to_string(), FieldValue::text(text));
        }
    }
    for fee in FEE_FIELDS {
        if let Some(n) = draft.number(fee).filter(|n| *n > 0.0) {
            record.fields.insert(fee.to_string(), FieldValue::Number(n));
        }
    }
    if let Some(FieldValue::List(items)) = draft.field("plannedActivities") {
        record.fields.insert("plannedActivities".into(), FieldValue::List(items.clone()));
    }

    record.tags = draft.tags.clone();
    record.custom_fields = draft.custom_fields.clone();
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_transform_defaults() {
        let schema = lead_wizard();
        let draft = schema
            .initial_draft()
            .with_field("firstName", "Jane")
            .with_field("lastName", "Doe")
            .with_field("email", "jane@acme.com")
            .with_field("workPhone", "+1 555 0100")
            .with_field("company", "Acme");

        let record = schema.to_record(&draft);
        assert_eq!(record.kind, EntityKind::Lead);
        assert_eq!(record.stage, "new");
        assert_eq!(record.fields["name"], FieldValue::text("Jane Doe"));
        assert_eq!(record.fields["phone"], FieldValue::text("+1 555 0100"));
        assert_eq!(record.fields["estimatedValue"], FieldValue::Number(0.0));
        assert_eq!(record.fields["status"], FieldValue::text("new"));
    }

    #[test]
    fn test_deal_transform_defaults() {
        let schema = deal_wizard();
        let record = schema.to_record(&WizardDraft::new());
        assert_eq!(record.fields["title"], FieldValue::text("Untitled Deal"));
        assert_eq!(record.fields["value"], FieldValue::Number(0.0));
        assert_eq!(record.fields["probability"], FieldValue::Number(10.0));
        assert_eq!(record.stage, "qualification");
    }

    #[test]
    fn test_defaults_are_not_user_content() {
        let schema = deal_wizard();
        let draft = schema.initial_draft();
        assert!(draft.has_content());
        assert!(!schema.has_user_content(&draft));
        assert!(schema.has_user_content(&draft.with_field("name", "Acme")));
    }

    #[test]
    fn test_step_counts() {
        assert_eq!(lead_wizard().step_count(), 4);
        assert_eq!(deal_wizard().step_count(), 5);
    }
}
