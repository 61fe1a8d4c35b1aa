//! The `models` plugin's v2 capabilities document (spec.md §4.8).

use serde_json::{json, Value};

pub fn document(base_path: &str) -> Value {
    json!({
        "schemaVersion": "v1",
        "plugin": {
            "name": "models",
            "version": "0.1.0",
            "description": "Catalogs machine learning models ingested from operator-defined sources.",
            "displayName": "Models",
            "icon": "cube"
        },
        "entities": [
            {
                "kind": "Model",
                "plural": "models",
                "displayName": "Model",
                "description": "A machine learning model tracked by this catalog.",
                "endpoints": {
                    "list": format!("{base_path}/models"),
                    "get": format!("{base_path}/models/{{name}}")
                },
                "fields": {
                    "columns": [
                        {"name": "name", "displayName": "Name", "path": "name", "type": "text", "sortable": true, "width": 240},
                        {"name": "sourceId", "displayName": "Source", "path": "sourceId", "type": "text", "sortable": true, "width": 160},
                        {"name": "framework", "displayName": "Framework", "path": "customProperties.framework", "type": "text", "sortable": true, "width": 140},
                        {"name": "lastUpdateTime", "displayName": "Updated", "path": "lastUpdateTimeSinceEpoch", "type": "dateTime", "sortable": true, "width": 180}
                    ],
                    "filterFields": [
                        {"name": "name", "displayName": "Name", "type": "text", "operators": ["$eq", "$regex"]},
                        {"name": "customProperties.framework", "displayName": "Framework", "type": "text", "operators": ["$eq", "$in"]}
                    ],
                    "detailFields": [
                        {"name": "name", "displayName": "Name", "path": "name", "type": "text", "section": "overview"},
                        {"name": "sourceId", "displayName": "Source", "path": "sourceId", "type": "text", "section": "overview"},
                        {"name": "customProperties", "displayName": "Properties", "path": "customProperties", "type": "json", "section": "details"}
                    ]
                },
                "uiHints": {"defaultSort": "name"},
                "actions": ["refreshSource"]
            }
        ],
        "sources": {
            "manageable": true,
            "refreshable": true,
            "types": ["yaml"]
        },
        "actions": [
            {
                "id": "refreshSource",
                "displayName": "Refresh",
                "description": "Re-run ingestion for this source.",
                "scope": "source",
                "supportsDryRun": false,
                "idempotent": true,
                "parameters": []
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_actions_resolve_to_plugin_level_actions() {
        let doc = document("/api/models/v1alpha1");
        let entity_actions: Vec<String> = doc["entities"][0]["actions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        let plugin_actions: Vec<String> = doc["actions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["id"].as_str().unwrap().to_string())
            .collect();
        for action in entity_actions {
            assert!(plugin_actions.contains(&action));
        }
    }
}
