//! Permissions gate.
//!
//! Role membership is decided outside the engine. The engine resolves a
//! page's permissions block once per session into a [`Permissions`] set and
//! derives which controls are shown. Controls the session may not use are
//! hidden rather than disabled.

use std::collections::BTreeSet;

use serde::Serialize;

use pageview_core::{
    ActionConfig, ExportFormat, PageConfig, PermissionKind, Permissions, PermissionsConfig,
};

use crate::actions::ActionScope;

/// Decides whether the current user holds any of a set of roles.
pub trait PermissionGate: Send + Sync {
    fn has_any_role(&self, roles: &[String]) -> bool;
}

/// A fixed role set.
#[derive(Debug, Clone, Default)]
pub struct StaticRoles {
    roles: BTreeSet<String>,
}

impl StaticRoles {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

impl PermissionGate for StaticRoles {
    fn has_any_role(&self, roles: &[String]) -> bool {
        roles.iter().any(|r| self.roles.contains(r))
    }
}

/// Grants every role.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionGate for AllowAll {
    fn has_any_role(&self, _roles: &[String]) -> bool {
        true
    }
}

/// Resolve a permissions block against the gate.
///
/// A kind without a role list is unrestricted. A page without a permissions
/// block grants everything.
pub fn resolve_permissions(
    config: Option<&PermissionsConfig>,
    gate: &dyn PermissionGate,
) -> Permissions {
    PermissionKind::ALL
        .into_iter()
        .filter(|&kind| match config.and_then(|c| c.roles(kind)) {
            None => true,
            Some(roles) => gate.has_any_role(roles),
        })
        .fold(Permissions::empty(), |granted, kind| {
            granted | Permissions::of(kind)
        })
}

/// Permission an action needs.
///
/// An explicit `permission` wins. Otherwise the primary action creates,
/// destructive or `delete` actions delete, and everything else updates.
pub fn action_permission(action: &ActionConfig, scope: ActionScope) -> PermissionKind {
    if let Some(kind) = action.permission {
        return kind;
    }
    match scope {
        ActionScope::Primary => PermissionKind::Create,
        ActionScope::Row | ActionScope::Bulk => {
            if action.is_destructive() || action.id == "delete" {
                PermissionKind::Delete
            } else {
                PermissionKind::Update
            }
        }
    }
}

/// Controls visible to the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Controls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_action: Option<ActionConfig>,
    pub row_actions: Vec<ActionConfig>,
    pub bulk_actions: Vec<ActionConfig>,
    pub search: bool,
    pub filters: bool,
    pub export_formats: Vec<ExportFormat>,
    /// Row selection is offered only when a bulk action is visible.
    pub selection: bool,
}

impl Controls {
    pub fn for_page(page: &PageConfig, permissions: Permissions) -> Self {
        let primary_action = page
            .primary_action
            .iter()
            .find(permitted(permissions, ActionScope::Primary))
            .cloned();
        let row_actions: Vec<ActionConfig> = page
            .row_actions
            .iter()
            .filter(permitted(permissions, ActionScope::Row))
            .cloned()
            .collect();
        let bulk_actions: Vec<ActionConfig> = page
            .toolbar
            .bulk_actions
            .iter()
            .filter(permitted(permissions, ActionScope::Bulk))
            .cloned()
            .collect();

        let readable = permissions.allows(PermissionKind::Read);
        let search = readable && page.toolbar.search.as_ref().is_some_and(|s| s.enabled);
        let filters = readable
            && page
                .toolbar
                .filters
                .as_ref()
                .is_some_and(|f| !f.fields.is_empty());
        let export_formats = match &page.toolbar.export {
            Some(export) if export.enabled && permissions.allows(PermissionKind::Export) => {
                export.formats.clone()
            }
            _ => Vec::new(),
        };

        Self {
            primary_action,
            selection: !bulk_actions.is_empty(),
            row_actions,
            bulk_actions,
            search,
            filters,
            export_formats,
        }
    }
}

fn permitted(permissions: Permissions, scope: ActionScope) -> impl Fn(&&ActionConfig) -> bool {
    move |action| permissions.allows(action_permission(action, scope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pageview_core::load_page;
    use serde_json::json;

    fn page() -> PageConfig {
        load_page(
            &json!({
                "id": "expenses",
                "title": "Expenses",
                "source": {"entity": "expense"},
                "views": {"table": {"columns": [{"field": "amount", "label": "Amount"}]}},
                "primaryAction": {"id": "new", "label": "New expense"},
                "rowActions": [
                    {"id": "edit", "label": "Edit"},
                    {"id": "approve", "label": "Approve", "permission": "export"}
                ],
                "toolbar": {
                    "search": {"fields": ["amount"]},
                    "filters": {"fields": [{"field": "amount", "label": "Amount", "type": "number"}]},
                    "export": {"enabled": true, "formats": ["csv", "xlsx"]},
                    "bulkActions": [{"id": "delete", "label": "Delete"}]
                },
                "permissions": {
                    "create": ["admin", "editor"],
                    "update": ["admin", "editor"],
                    "delete": ["admin"],
                    "export": ["admin", "auditor"]
                }
            })
            .to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_permissions() {
        let page = page();
        let editor = resolve_permissions(page.permissions.as_ref(), &StaticRoles::new(["editor"]));
        assert!(editor.allows(PermissionKind::Create));
        assert!(editor.allows(PermissionKind::Update));
        assert!(!editor.allows(PermissionKind::Delete));
        assert!(!editor.allows(PermissionKind::Export));
        // No role list for read or import
        assert!(editor.allows(PermissionKind::Read));
        assert!(editor.allows(PermissionKind::Import));

        let nobody = resolve_permissions(page.permissions.as_ref(), &StaticRoles::default());
        assert_eq!(nobody, Permissions::READ | Permissions::IMPORT);

        assert_eq!(resolve_permissions(None, &StaticRoles::default()), Permissions::all());
        assert_eq!(
            resolve_permissions(page.permissions.as_ref(), &AllowAll),
            Permissions::all()
        );
    }

    #[test]
    fn test_action_permission_defaults() {
        let page = page();
        let new = page.primary_action.as_ref().unwrap();
        assert_eq!(action_permission(new, ActionScope::Primary), PermissionKind::Create);
        let edit = page.row_action("edit").unwrap();
        assert_eq!(action_permission(edit, ActionScope::Row), PermissionKind::Update);
        let approve = page.row_action("approve").unwrap();
        assert_eq!(action_permission(approve, ActionScope::Row), PermissionKind::Export);
        let delete = page.bulk_action("delete").unwrap();
        assert_eq!(action_permission(delete, ActionScope::Bulk), PermissionKind::Delete);
    }

    #[test]
    fn test_controls_hidden_not_disabled() {
        let page = page();
        let auditor = resolve_permissions(page.permissions.as_ref(), &StaticRoles::new(["auditor"]));
        let controls = Controls::for_page(&page, auditor);

        assert!(controls.primary_action.is_none());
        let row_ids: Vec<&str> = controls.row_actions.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(row_ids, ["approve"]);
        assert!(controls.bulk_actions.is_empty());
        assert!(!controls.selection);
        assert!(controls.search);
        assert!(controls.filters);
        assert_eq!(controls.export_formats, vec![ExportFormat::Csv, ExportFormat::Xlsx]);

        let admin = resolve_permissions(page.permissions.as_ref(), &StaticRoles::new(["admin"]));
        let controls = Controls::for_page(&page, admin);
        assert!(controls.primary_action.is_some());
        assert!(controls.selection);
        assert_eq!(controls.row_actions.len(), 2);
    }

    #[test]
    fn test_read_gate_hides_search_and_filters() {
        let mut page = page();
        if let Some(p) = page.permissions.as_mut() {
            p.read = Some(vec!["staff".to_string()]);
        }
        let outsider = resolve_permissions(page.permissions.as_ref(), &StaticRoles::default());
        let controls = Controls::for_page(&page, outsider);
        assert!(!controls.search);
        assert!(!controls.filters);
    }
}
