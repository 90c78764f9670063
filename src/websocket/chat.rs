//! Multi-room chat over JSON frames.
//!
//! Inbound frames are `{"type": "message" | "set_username" | "typing", ...}`
//! (the type defaults to `message`). Every outbound frame carries `type`,
//! `message` and an RFC 3339 `timestamp`.

use super::error::WebSocketResult;
use super::message::WsMessage;
use super::session::{WebSocketSession, WsHandler};
use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Map, Value, json};

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChatCommand {
    Message {
        #[serde(default)]
        message: String,
    },
    SetUsername {
        #[serde(default)]
        username: Option<String>,
    },
    Typing,
}

fn parse_command(text: &str) -> Result<Option<ChatCommand>, serde_json::Error> {
    let mut frame: Map<String, Value> = serde_json::from_str(text)?;
    let kind = frame
        .entry("type")
        .or_insert_with(|| Value::String("message".to_string()));
    match kind.as_str() {
        Some("message" | "set_username" | "typing") => {}
        _ => return Ok(None),
    }
    serde_json::from_value(Value::Object(frame)).map(Some)
}

/// Room chat. The room name comes from a path parameter, `room` unless
/// configured otherwise.
#[derive(Debug, Clone)]
pub struct ChatSession {
    room_param: String,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self {
            room_param: "room".to_string(),
        }
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room_param(mut self, name: impl Into<String>) -> Self {
        self.room_param = name.into();
        self
    }

    async fn run(self, mut session: WebSocketSession) -> WebSocketResult<()> {
        let room = session.param(&self.room_param).unwrap_or("general").to_string();
        session.join(&room)?;

        let username = session.label();
        session.send_json(&json!({
            "type": "system",
            "message": format!("Welcome to room '{room}'!"),
            "client_id": session.id(),
            "timestamp": now(),
        }))?;
        session.broadcast_json(
            &room,
            &json!({
                "type": "user_joined",
                "username": username,
                "message": format!("{username} joined the room"),
                "client_id": session.id(),
                "timestamp": now(),
            }),
            false,
        )?;
        tracing::info!("{} joined chat room {}", username, room);

        while let Some(frame) = session.recv().await {
            let WsMessage::Text(text) = frame else {
                continue;
            };
            let command = match parse_command(&text) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    session.send_json(&json!({
                        "type": "system",
                        "message": format!("Invalid message: {e}"),
                        "client_id": session.id(),
                        "timestamp": now(),
                    }))?;
                    continue;
                }
            };
            self.handle(&session, &room, command)?;
        }

        let username = session.label();
        session.broadcast_json(
            &room,
            &json!({
                "type": "user_left",
                "username": username,
                "message": format!("{username} left the room"),
                "client_id": session.id(),
                "timestamp": now(),
            }),
            false,
        )?;
        tracing::info!("{} left chat room {}", username, room);
        Ok(())
    }

    fn handle(&self, session: &WebSocketSession, room: &str, command: ChatCommand) -> WebSocketResult<()> {
        match command {
            ChatCommand::Message { message } => {
                session.broadcast_json(
                    room,
                    &json!({
                        "type": "message",
                        "username": session.label(),
                        "message": message,
                        "client_id": session.id(),
                        "timestamp": now(),
                    }),
                    true,
                )?;
            }
            ChatCommand::SetUsername { username } => {
                let old_username = session.label();
                let new_username = username
                    .map(|u| u.trim().to_string())
                    .filter(|u| !u.is_empty())
                    .unwrap_or_else(|| old_username.clone());
                session.set_label(new_username.clone())?;
                session.broadcast_json(
                    room,
                    &json!({
                        "type": "username_changed",
                        "old_username": old_username,
                        "new_username": new_username,
                        "message": format!("{old_username} is now known as {new_username}"),
                        "client_id": session.id(),
                        "timestamp": now(),
                    }),
                    true,
                )?;
            }
            ChatCommand::Typing => {
                session.broadcast_json(
                    room,
                    &json!({
                        "type": "typing",
                        "username": session.label(),
                        "message": "",
                        "client_id": session.id(),
                        "timestamp": now(),
                    }),
                    false,
                )?;
            }
        }
        Ok(())
    }
}

impl WsHandler for ChatSession {
    fn call(&self, session: WebSocketSession) -> BoxFuture<'static, WebSocketResult<()>> {
        Box::pin(self.clone().run(session))
    }
}

/// Lists active rooms and their members. Sends a `rooms_update` on
/// connect and again for every frame received.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lobby;

impl Lobby {
    fn snapshot(session: &WebSocketSession) -> Value {
        let manager = session.manager();
        let rooms: Map<String, Value> = manager
            .rooms()
            .into_iter()
            .map(|room| {
                let members = manager.room_members(&room);
                let usernames: Vec<String> = members
                    .iter()
                    .map(|id| manager.label(id).unwrap_or_else(|| "Unknown".to_string()))
                    .collect();
                let info = json!({ "users": members.len(), "usernames": usernames });
                (room, info)
            })
            .collect();
        json!({
            "type": "rooms_update",
            "message": format!("{} active rooms", rooms.len()),
            "rooms": rooms,
            "timestamp": now(),
        })
    }

    async fn run(mut session: WebSocketSession) -> WebSocketResult<()> {
        session.send_json(&Self::snapshot(&session))?;
        while session.recv().await.is_some() {
            session.send_json(&Self::snapshot(&session))?;
        }
        Ok(())
    }
}

impl WsHandler for Lobby {
    fn call(&self, session: WebSocketSession) -> BoxFuture<'static, WebSocketResult<()>> {
        Box::pin(Self::run(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands() {
        assert!(matches!(
            parse_command(r#"{"message": "hi"}"#),
            Ok(Some(ChatCommand::Message { ref message })) if message == "hi"
        ));
        assert!(matches!(
            parse_command(r#"{"type": "set_username", "username": "neo"}"#),
            Ok(Some(ChatCommand::SetUsername { username: Some(ref u) })) if u == "neo"
        ));
        assert!(matches!(parse_command(r#"{"type": "typing"}"#), Ok(Some(ChatCommand::Typing))));
        assert!(matches!(parse_command(r#"{"type": "dance"}"#), Ok(None)));
        assert!(parse_command("not json").is_err());
    }
}
