//! Handler tests against the in-memory store.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Path, Query, State},
    http::{Method, Request, StatusCode},
    response::IntoResponse,
    Json,
};
use engine::{EditorCommand, LayoutDirection, MemoryWorkflowStore, Position, WorkflowDefinition};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    handlers::{
        catalog,
        layout::{self, LayoutRequest},
        transfer::{self, ImportParams},
        workflows::{self, CommandBatch, CreateWorkflowRequest, SaveDefinitionRequest},
    },
    router, AppState,
};

fn state() -> AppState {
    AppState::new(Arc::new(MemoryWorkflowStore::new()))
}

async fn create(state: &AppState, name: &str) -> Uuid {
    let (status, Json(record)) = workflows::create(
        State(state.clone()),
        Json(CreateWorkflowRequest { name: name.into() }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    record.id
}

fn add(type_tag: &str) -> EditorCommand {
    EditorCommand::AddNode {
        type_tag: type_tag.into(),
        label: None,
        position: Position::default(),
    }
}

#[tokio::test]
async fn catalog_lists_every_node_type() {
    let Json(entries) = catalog::list().await;
    let tags: Vec<_> = entries.iter().map(|e| e.type_tag).collect();
    assert!(tags.contains(&"quickReply"));
    assert!(tags.contains(&"message.location"));
    assert_eq!(entries.len(), 7);
}

#[tokio::test]
async fn create_list_get_delete() {
    let state = state();
    let id = create(&state, "Welcome").await;

    let Json(all) = workflows::list(State(state.clone())).await.unwrap();
    assert_eq!(all.len(), 1);

    let Json(record) = workflows::get(Path(id), State(state.clone())).await.unwrap();
    assert_eq!(record.name, "Welcome");
    assert_eq!(record.definition, WorkflowDefinition::default());

    let status = workflows::delete(Path(id), State(state.clone())).await.unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let err = workflows::get(Path(id), State(state)).await.unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn blank_names_are_rejected() {
    let err = workflows::create(
        State(state()),
        Json(CreateWorkflowRequest { name: "   ".into() }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn save_definition_validates_and_versions() {
    let state = state();
    let id = create(&state, "Support").await;

    let request = |body: serde_json::Value| -> SaveDefinitionRequest {
        serde_json::from_value(body).unwrap()
    };

    // A trigger may never be the entry node.
    let invalid = request(json!({
        "nodes": [{ "id": "t", "type": "keywordTrigger" }],
        "edges": [],
        "entryNodeId": "t",
        "expectedVersion": 0
    }));
    let err = workflows::save_definition(Path(id), State(state.clone()), Json(invalid))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    let valid = request(json!({
        "nodes": [
            { "id": "t", "type": "keywordTrigger", "config": { "keywords": ["help"] } },
            { "id": "m", "type": "message.text", "config": { "body": "Hi!" } }
        ],
        "edges": [{ "id": "e", "source": "t", "target": "m", "targetHandle": "in" }],
        "entryNodeId": "m",
        "expectedVersion": 0
    }));
    let Json(saved) = workflows::save_definition(Path(id), State(state.clone()), Json(valid))
        .await
        .unwrap();
    assert_eq!(saved.version, 1);
    assert_eq!(saved.definition.entry_node_id.as_deref(), Some("m"));

    let stale = request(json!({ "nodes": [], "edges": [], "expectedVersion": 0 }));
    let err = workflows::save_definition(Path(id), State(state), Json(stale))
        .await
        .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn command_batches_apply_in_order() {
    let state = state();
    let id = create(&state, "Menu").await;

    let Json(saved) = workflows::apply_commands(
        Path(id),
        State(state.clone()),
        Json(CommandBatch {
            commands: vec![add("firstMessageTrigger"), add("message.text")],
        }),
    )
    .await
    .unwrap();
    assert_eq!(saved.version, 1);
    let trigger = saved.definition.nodes[0].id.clone();
    let reply = saved.definition.nodes[1].id.clone();

    let batch: CommandBatch = serde_json::from_value(json!({ "commands": [
        { "command": "connect", "source": trigger, "target": reply },
        { "command": "setEntryNode", "id": reply }
    ] }))
    .unwrap();
    let Json(saved) = workflows::apply_commands(Path(id), State(state.clone()), Json(batch))
        .await
        .unwrap();
    assert_eq!(saved.version, 2);
    assert_eq!(saved.definition.edges.len(), 1);
    assert_eq!(saved.definition.entry_node_id, Some(reply.clone()));

    // A rejected command aborts the whole batch.
    let batch = CommandBatch {
        commands: vec![
            EditorCommand::DeleteNode { id: reply.clone() },
            EditorCommand::SetEntryNode { id: Some(trigger) },
        ],
    };
    let err = workflows::apply_commands(Path(id), State(state.clone()), Json(batch))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    let Json(record) = workflows::get(Path(id), State(state)).await.unwrap();
    assert_eq!(record.version, 2);
    assert_eq!(record.definition.nodes.len(), 2);
}

#[tokio::test]
async fn export_then_import_into_another_workflow() {
    let state = state();
    let source = create(&state, "Source").await;
    let target = create(&state, "Target").await;

    workflows::apply_commands(
        Path(source),
        State(state.clone()),
        Json(CommandBatch {
            commands: vec![add("keywordTrigger"), add("listMessage")],
        }),
    )
    .await
    .unwrap();

    let Json(doc) = transfer::export(Path(source), State(state.clone())).await.unwrap();
    assert_eq!(doc.schema_version, "1.0");
    assert_eq!(doc.workflow.name, "Source");

    let body = serde_json::to_string(&doc).unwrap();
    let Json(response) = transfer::import(
        Path(target),
        State(state.clone()),
        Query(ImportParams::default()),
        body.clone(),
    )
    .await
    .unwrap();
    assert_eq!(response.report.nodes_imported, 2);
    assert_eq!(response.saved.version, 1);

    // Merging the same document again forces every id to be remapped.
    let Json(response) = transfer::import(
        Path(target),
        State(state.clone()),
        Query(ImportParams {
            mode: engine::ImportMode::Merge,
        }),
        body,
    )
    .await
    .unwrap();
    assert_eq!(response.report.remapped_node_ids.len(), 2);
    assert_eq!(response.saved.definition.nodes.len(), 4);
}

#[tokio::test]
async fn malformed_import_is_a_bad_request() {
    let state = state();
    let id = create(&state, "Target").await;

    for body in ["not json", r#"{"nodes":[],"edges":[]}"#, r#"{"schemaVersion":"2.0","nodes":[],"edges":[]}"#] {
        let err = transfer::import(
            Path(id),
            State(state.clone()),
            Query(ImportParams::default()),
            body.to_owned(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST, "body: {body}");
    }
}

#[tokio::test]
async fn layout_moves_nodes_and_saves() {
    let state = state();
    let id = create(&state, "Layout").await;

    let Json(saved) = workflows::apply_commands(
        Path(id),
        State(state.clone()),
        Json(CommandBatch {
            commands: vec![add("firstMessageTrigger"), add("message.text")],
        }),
    )
    .await
    .unwrap();
    let (a, b) = (saved.definition.nodes[0].id.clone(), saved.definition.nodes[1].id.clone());
    let batch: CommandBatch = serde_json::from_value(json!({ "commands": [
        { "command": "connect", "source": a, "target": b }
    ] }))
    .unwrap();
    workflows::apply_commands(Path(id), State(state.clone()), Json(batch))
        .await
        .unwrap();

    let Json(saved) = layout::auto_layout(
        Path(id),
        State(state),
        Json(LayoutRequest {
            direction: LayoutDirection::TopBottom,
        }),
    )
    .await
    .unwrap();
    assert_eq!(saved.version, 3);
    let first = saved.definition.nodes[0].position;
    let second = saved.definition.nodes[1].position;
    assert_eq!(first.x, second.x);
    assert!(second.y > first.y);
}

#[tokio::test]
async fn omitted_entry_key_keeps_the_stored_entry() {
    let state = state();
    let id = create(&state, "Entry").await;

    let save = |body: serde_json::Value| {
        let state = state.clone();
        async move {
            let request: SaveDefinitionRequest = serde_json::from_value(body).unwrap();
            workflows::save_definition(Path(id), State(state), Json(request))
                .await
                .unwrap()
                .0
        }
    };
    let nodes = json!([
        { "id": "m", "type": "message.text" },
        { "id": "n", "type": "message.media" }
    ]);

    let saved = save(json!({ "nodes": nodes, "edges": [], "entryNodeId": "m" })).await;
    assert_eq!(saved.definition.entry_node_id.as_deref(), Some("m"));

    // No key: no change to the entry node.
    let saved = save(json!({ "nodes": nodes, "edges": [] })).await;
    assert_eq!(saved.definition.entry_node_id.as_deref(), Some("m"));

    // Explicit null: clear it.
    let saved = save(json!({ "nodes": nodes, "edges": [], "entryNodeId": null })).await;
    assert_eq!(saved.definition.entry_node_id, None);

    // No key, but the stored entry node is gone from the new definition.
    save(json!({ "nodes": nodes, "edges": [], "entryNodeId": "n" })).await;
    let saved = save(json!({ "nodes": [{ "id": "m", "type": "message.text" }], "edges": [] })).await;
    assert_eq!(saved.definition.entry_node_id, None);
    assert_eq!(saved.version, 5);
}

async fn send(state: &AppState, method: Method, uri: &str, body: Option<String>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if body.is_some() {
        request = request.header("content-type", "application/json");
    }
    let request = request.body(body.map(Body::from).unwrap_or_else(Body::empty)).unwrap();

    let response = router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn routes_serve_the_editor_over_http() {
    let state = state();

    let (status, catalog) = send(&state, Method::GET, "/api/v1/catalog", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(catalog.as_array().unwrap().len(), 7);

    let (status, created) = send(
        &state,
        Method::POST,
        "/api/v1/workflows",
        Some(json!({ "name": "Over HTTP" }).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_owned();

    let commands = json!({ "commands": [
        { "command": "addNode", "typeTag": "firstMessageTrigger" },
        { "command": "addNode", "typeTag": "message.text", "label": "Hello" }
    ] });
    let (status, saved) = send(
        &state,
        Method::POST,
        &format!("/api/v1/workflows/{id}/commands"),
        Some(commands.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["version"], 1);
    assert_eq!(saved["definition"]["nodes"][1]["label"], "Hello");

    let (status, export) = send(&state, Method::GET, &format!("/api/v1/workflows/{id}/export"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(export["schemaVersion"], "1.0");

    let (status, imported) = send(
        &state,
        Method::POST,
        &format!("/api/v1/workflows/{id}/import?mode=merge"),
        Some(export.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(imported["report"]["remappedNodeIds"].as_object().unwrap().len(), 2);
    assert_eq!(imported["definition"]["nodes"].as_array().unwrap().len(), 4);

    let (status, laid_out) = send(
        &state,
        Method::POST,
        &format!("/api/v1/workflows/{id}/layout"),
        Some(json!({ "direction": "TB" }).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(laid_out["version"], 3);

    let (status, body) = send(
        &state,
        Method::GET,
        &format!("/api/v1/workflows/{}", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}
