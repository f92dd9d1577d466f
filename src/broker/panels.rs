//! Panel registry — deduplicating identity for UI surfaces.
//!
//! `openView` requests with the same normalized parameters resolve to
//! the same panel id, so "open repository X" twice reuses one panel.
//! View parameters are normalized before id derivation: URLs through
//! [`normalize_url`], list ids through the stable id function.

use std::collections::HashMap;

use gitsocial::normalize_url;

use crate::social::lists::stable_list_id;

/// View parameters of an `openView` request.
#[derive(Clone, Debug, Default)]
pub struct ViewParams {
    pub url: Option<String>,
    pub list: Option<String>,
    pub post: Option<String>,
}

/// One open UI panel.
#[derive(Clone, Debug)]
pub struct Panel {
    pub id: String,
    pub view_type: String,
    pub title: String,
    pub icon: Option<String>,
    pub visible: bool,
}

/// Derive the panel identity for a view. `viewPost`, `viewList`, and
/// `repository` embed their normalized subject; every other view type is
/// a singleton keyed by its type name.
pub fn panel_id(view_type: &str, params: &ViewParams) -> String {
    match view_type {
        "viewPost" => match &params.post {
            Some(post) => format!("viewPost:{}", post),
            None => view_type.to_string(),
        },
        "viewList" => match &params.list {
            Some(list) => format!("viewList:{}", stable_list_id(list)),
            None => view_type.to_string(),
        },
        "repository" => match &params.url {
            Some(url) => format!("repository:{}", normalize_url(url)),
            None => view_type.to_string(),
        },
        other => other.to_string(),
    }
}

#[derive(Default)]
pub struct PanelRegistry {
    panels: HashMap<String, Panel>,
    active: Option<String>,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or reveal) a panel. Returns `(id, created)`; an existing
    /// panel is reused and becomes active either way.
    pub fn open(&mut self, view_type: &str, params: &ViewParams) -> (String, bool) {
        let id = panel_id(view_type, params);
        let created = !self.panels.contains_key(&id);
        if created {
            self.panels.insert(
                id.clone(),
                Panel {
                    id: id.clone(),
                    view_type: view_type.to_string(),
                    title: view_type.to_string(),
                    icon: None,
                    visible: true,
                },
            );
        }
        self.active = Some(id.clone());
        (id, created)
    }

    pub fn get(&self, id: &str) -> Option<&Panel> {
        self.panels.get(id)
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    /// All panel ids, stable order.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.panels.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn active_panel(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn set_title(&mut self, id: &str, title: &str) -> bool {
        match self.panels.get_mut(id) {
            Some(panel) => {
                panel.title = title.to_string();
                true
            }
            None => false,
        }
    }

    pub fn set_icon(&mut self, id: &str, icon: &str) -> bool {
        match self.panels.get_mut(id) {
            Some(panel) => {
                panel.icon = Some(icon.to_string());
                true
            }
            None => false,
        }
    }

    /// Visibility changes set (or clear) the active panel.
    pub fn set_visible(&mut self, id: &str, visible: bool) -> bool {
        let Some(panel) = self.panels.get_mut(id) else {
            return false;
        };
        panel.visible = visible;
        if visible {
            self.active = Some(id.to_string());
        } else if self.active.as_deref() == Some(id) {
            self.active = None;
        }
        true
    }

    /// Dispose a panel. Further responses to it are dropped on the floor
    /// by the server loop. Disposal always clears the active panel — the
    /// broadcast that follows carries an empty id regardless of which
    /// panel was in front.
    pub fn dispose(&mut self, id: &str) -> bool {
        let existed = self.panels.remove(id).is_some();
        self.active = None;
        existed
    }
}
