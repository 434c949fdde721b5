//! Master data: contacts, articles, projects and tasks

use serde_json::{json, Value};

use super::crud::CrudSuite;
use super::{keys, ARTICLES, CONTACTS, PROJECTS, TASKS};
use crate::context::TestContext;
use crate::definition::TestDefinition;

pub fn contacts() -> Vec<TestDefinition> {
    CrudSuite {
        category: CONTACTS,
        prefix: "contact",
        label: "Contact",
        path: "/api/contacts",
        fixture_key: keys::CONTACT,
        create_after: &["setup-login"],
        cleanup_after: &["project-cleanup", "offer-cleanup"],
        create_body: contact_body,
        update_body: contact_update,
    }
    .definitions()
}

pub fn articles() -> Vec<TestDefinition> {
    CrudSuite {
        category: ARTICLES,
        prefix: "article",
        label: "Article",
        path: "/api/articles",
        fixture_key: keys::ARTICLE,
        create_after: &["setup-login"],
        cleanup_after: &["offer-cleanup"],
        create_body: article_body,
        update_body: article_update,
    }
    .definitions()
}

pub fn projects() -> Vec<TestDefinition> {
    CrudSuite {
        category: PROJECTS,
        prefix: "project",
        label: "Project",
        path: "/api/projects",
        fixture_key: keys::PROJECT,
        create_after: &["contact-create"],
        cleanup_after: &["task-cleanup"],
        create_body: project_body,
        update_body: project_update,
    }
    .definitions()
}

pub fn tasks() -> Vec<TestDefinition> {
    CrudSuite {
        category: TASKS,
        prefix: "task",
        label: "Task",
        path: "/api/tasks",
        fixture_key: keys::TASK,
        create_after: &["project-create"],
        cleanup_after: &[],
        create_body: task_body,
        update_body: task_update,
    }
    .definitions()
}

fn contact_body(ctx: &TestContext) -> Option<Value> {
    Some(json!({
        "firstName": "Test",
        "lastName": ctx.unique("Contact"),
        "email": format!("contact-{}@fieldcheck.test", ctx.run_id()),
        "type": "person",
    }))
}

fn contact_update(ctx: &TestContext) -> Option<Value> {
    Some(json!({
        "firstName": "Updated",
        "lastName": ctx.unique("Contact"),
        "email": format!("contact-{}@fieldcheck.test", ctx.run_id()),
        "phone": "+1 555 0100",
        "type": "person",
    }))
}

fn article_body(ctx: &TestContext) -> Option<Value> {
    Some(json!({
        "name": ctx.unique("Test Article"),
        "sku": format!("FC-{}", ctx.run_id()),
        "type": "material",
        "unitPrice": 49.5,
    }))
}

fn article_update(ctx: &TestContext) -> Option<Value> {
    Some(json!({
        "name": ctx.unique("Updated Article"),
        "sku": format!("FC-{}", ctx.run_id()),
        "type": "material",
        "unitPrice": 55.0,
    }))
}

fn project_body(ctx: &TestContext) -> Option<Value> {
    let contact = ctx.fixtures.get(keys::CONTACT)?;
    Some(json!({
        "name": ctx.unique("Test Project"),
        "contactId": contact.to_json(),
        "status": "active",
    }))
}

fn project_update(ctx: &TestContext) -> Option<Value> {
    let contact = ctx.fixtures.get(keys::CONTACT)?;
    Some(json!({
        "name": ctx.unique("Updated Project"),
        "contactId": contact.to_json(),
        "status": "on_hold",
    }))
}

fn task_body(ctx: &TestContext) -> Option<Value> {
    let project = ctx.fixtures.get(keys::PROJECT)?;
    Some(json!({
        "title": ctx.unique("Test Task"),
        "projectId": project.to_json(),
        "assigneeId": ctx.session.user_id.clone(),
        "priority": "medium",
    }))
}

fn task_update(ctx: &TestContext) -> Option<Value> {
    let project = ctx.fixtures.get(keys::PROJECT)?;
    Some(json!({
        "title": ctx.unique("Updated Task"),
        "projectId": project.to_json(),
        "priority": "high",
        "status": "in_progress",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiClient;
    use crate::config::ApiConfig;
    use fieldcheck_common::SessionCredentials;

    fn ctx() -> TestContext {
        TestContext::new(
            ApiClient::new(&ApiConfig::default()).unwrap(),
            SessionCredentials::new("qa@crm.test", "pw"),
        )
    }

    #[test]
    fn test_crud_ids() {
        let ids: Vec<String> = contacts().into_iter().map(|t| t.id).collect();
        assert_eq!(
            ids,
            vec!["contact-create", "contact-list", "contact-get", "contact-update", "contact-cleanup"]
        );
    }

    #[test]
    fn test_cleanup_waits_for_referencing_tests() {
        let cleanup = contacts().into_iter().find(|t| t.id == "contact-cleanup").unwrap();
        assert!(cleanup.run_if_dependency_failed);
        assert!(cleanup.depends_on.contains(&"offer-cleanup".to_string()));
        assert!(cleanup.depends_on.contains(&"project-cleanup".to_string()));
    }

    #[test]
    fn test_dependent_payload_needs_fixture() {
        let mut ctx = ctx();
        assert!(project_body(&ctx).is_none());

        // zero is a valid backend id
        ctx.fixtures.set(keys::CONTACT, 0i64);
        let body = project_body(&ctx).unwrap();
        assert_eq!(body["contactId"], json!(0));
    }
}
