//! WebSocket upgrade + message loop. Each text frame carries one `ClientWsMessage`;
//! the server answers every frame with exactly one `ServerWsMessage`.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::logic::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "question_pipeline", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "question_pipeline", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "question_pipeline", "WS received: {:?}", &incoming);
            dispatch(incoming, &state)
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid message: {e}"), validation: None },
        };

        let out = serde_json::to_string(&reply).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {e}") }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "question_pipeline", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "question_pipeline", "WebSocket disconnected");
}

fn dispatch(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Normalize(body) => {
      let out = normalize_text(state, &body.text, &body.context);
      info!(target: "question", source = out.source, count = out.questions.len(), "WS normalize served");
      ServerWsMessage::Normalized(out)
    }

    ClientWsMessage::Convert(body) => match convert_record(state, body.record, &body.context) {
      Ok(p) => ServerWsMessage::Converted { question: Box::new(p) },
      Err(e) => ServerWsMessage::Error { message: e.error, validation: e.validation },
    },

    ClientWsMessage::Infer(body) => match infer_record(state, body.record, &body.context) {
      Ok(inference) => ServerWsMessage::Inferred { inference },
      Err(e) => ServerWsMessage::Error { message: e.error, validation: None },
    },

    ClientWsMessage::Validate(body) => ServerWsMessage::Validation { result: validate(state, body) },

    ClientWsMessage::Stats => ServerWsMessage::Stats { stats: state.pipeline.statistics() },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::pipeline::Pipeline;
  use serde_json::{json, Value};

  fn roundtrip(state: &AppState, msg: Value) -> Value {
    let incoming: ClientWsMessage = serde_json::from_value(msg).expect("client message");
    serde_json::to_value(dispatch(incoming, state)).expect("server message")
  }

  #[test]
  fn ping_pong() {
    let state = AppState::with_pipeline(Pipeline::default());
    assert_eq!(roundtrip(&state, json!({"type": "ping"})), json!({"type": "pong"}));
  }

  #[test]
  fn infer_reports_kind() {
    let state = AppState::with_pipeline(Pipeline::default());
    let out = roundtrip(&state, json!({
      "type": "infer",
      "record": {"prompt": "How many stars?", "visual": "⭐⭐⭐⭐", "options": ["3", "4", "5", "6"]},
      "context": {"subject": "Math", "grade": "K"}
    }));
    assert_eq!(out["type"], json!("inferred"));
    assert_eq!(out["inference"]["kind"], json!("counting"));
  }

  #[test]
  fn convert_error_becomes_error_message() {
    let state = AppState::with_pipeline(Pipeline::default());
    let out = roundtrip(&state, json!({"type": "convert", "record": "not an object"}));
    assert_eq!(out["type"], json!("error"));
    assert!(out.get("validation").is_none());
  }

  #[test]
  fn stats_follow_validate() {
    let state = AppState::with_pipeline(Pipeline::default());
    let out = roundtrip(&state, json!({"type": "validate", "record": {"prompt": "", "type": "short_answer", "answer": "x"}, "grade": "3"}));
    assert_eq!(out["type"], json!("validation"));
    assert_eq!(out["result"]["valid"], json!(false));
    let stats = roundtrip(&state, json!({"type": "stats"}));
    assert_eq!(stats["stats"]["totalValidations"], json!(1));
  }
}
