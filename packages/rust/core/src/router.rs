//! Turns incoming chat text into pipeline invocations and replies.
//!
//! Scheduled announcements arrive here as ordinary messages, so a synthesized
//! `!events` goes through exactly the same path as one typed by a user.

use std::collections::HashMap;

use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use lodebot_shared::{AnnouncementConfig, FailureKind, LodebotError, Result};

use crate::pipeline::{LookupRequest, ResolutionPipeline};
use crate::summary::{Summary, format_summary};

/// A chat message as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub channel: u64,
    pub text: String,
}

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Lookup(LookupRequest),
    Announcement(String),
}

/// What to send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Summary(Summary),
    Text(String),
    Failure { kind: FailureKind, message: String },
    /// Not addressed to us, or an unknown command.
    Ignored,
}

impl Reply {
    /// Render for a plain-text transport. `None` for [`Reply::Ignored`].
    pub fn to_plain_text(&self) -> Option<String> {
        match self {
            Self::Summary(summary) => Some(summary.to_plain_text()),
            Self::Text(text) => Some(text.clone()),
            Self::Failure { message, .. } => Some(message.clone()),
            Self::Ignored => None,
        }
    }
}

/// Routes prefixed commands to the pipeline or to announcement texts.
#[derive(Debug, Clone)]
pub struct CommandRouter {
    prefix: String,
    pipeline: ResolutionPipeline,
    announcements: HashMap<String, String>,
}

impl CommandRouter {
    pub fn new(
        prefix: impl Into<String>,
        pipeline: ResolutionPipeline,
        announcements: &[AnnouncementConfig],
    ) -> Self {
        Self {
            prefix: prefix.into(),
            pipeline,
            announcements: announcements
                .iter()
                .map(|a| (a.name.clone(), a.message.clone()))
                .collect(),
        }
    }

    /// Names of every command this router answers to.
    pub fn command_names(&self) -> Vec<String> {
        let mut names = vec!["lookup".to_string(), "lookupId".to_string()];
        let mut announcements: Vec<String> = self.announcements.keys().cloned().collect();
        announcements.sort();
        names.extend(announcements);
        names
    }

    /// Parse `text`. `None` when it is not a command we know.
    pub fn parse(&self, text: &str) -> Option<Result<Command>> {
        let body = text.trim().strip_prefix(self.prefix.as_str())?;
        let mut words = body.split_whitespace();
        let name = words.next()?;
        let args: Vec<&str> = words.collect();

        if name.eq_ignore_ascii_case("lookup") {
            return Some(match args.as_slice() {
                [world, forename, surname] => Ok(Command::Lookup(LookupRequest::Search {
                    world: world.to_string(),
                    forename: forename.to_string(),
                    surname: surname.to_string(),
                })),
                _ => Err(LodebotError::invalid_argument(
                    "lookup takes exactly <world> <forename> <surname>",
                )),
            });
        }

        if name.eq_ignore_ascii_case("lookupId") {
            return Some(match args.as_slice() {
                [id] => Ok(Command::Lookup(LookupRequest::DirectId(id.to_string()))),
                _ => Err(LodebotError::invalid_argument("lookupId takes exactly <id>")),
            });
        }

        self.announcements
            .contains_key(name)
            .then(|| Ok(Command::Announcement(name.to_string())))
    }

    /// Handle one message end to end. Never fails: every fault becomes a
    /// [`Reply::Failure`].
    pub async fn handle(&self, message: &IncomingMessage) -> Reply {
        let request_id = Uuid::now_v7();
        let span = info_span!("command", %request_id, channel = message.channel);
        self.dispatch(&message.text).instrument(span).await
    }

    async fn dispatch(&self, text: &str) -> Reply {
        let command = match self.parse(text) {
            None => return Reply::Ignored,
            Some(Err(err)) => return failure(&err),
            Some(Ok(command)) => command,
        };
        debug!(?command, "routing command");

        match command {
            Command::Lookup(request) => match self.pipeline.run(request).await {
                Ok(resolved) => Reply::Summary(format_summary(&resolved)),
                Err(err) => failure(&err),
            },
            Command::Announcement(name) => match self.announcements.get(&name) {
                Some(message) if !message.is_empty() => Reply::Text(message.clone()),
                _ => Reply::Ignored,
            },
        }
    }
}

/// Map an error onto the user-visible failure reply.
fn failure(err: &LodebotError) -> Reply {
    let kind = err.kind();
    info!(?kind, retryable = kind.is_retryable(), "command failed");
    let message = match kind {
        FailureKind::InvalidArgument => format!("{} ({err})", kind.user_message()),
        _ => kind.user_message().to_string(),
    };
    Reply::Failure { kind, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use lodebot_lookup::LookupClient;
    use lodebot_shared::{AppConfig, LookupConfig};
    use url::Url;
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::classify::ClassTable;

    fn router_for(server: &MockServer) -> CommandRouter {
        let client =
            LookupClient::new(LookupConfig::for_base_url(Url::parse(&server.uri()).unwrap()))
                .unwrap();
        let pipeline = ResolutionPipeline::new(client, Arc::new(ClassTable::builtin()));
        CommandRouter::new("!", pipeline, &AppConfig::default().announcements)
    }

    fn message(text: &str) -> IncomingMessage {
        IncomingMessage {
            channel: 7,
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn test_parse_commands() {
        let server = MockServer::start().await;
        let router = router_for(&server);

        assert_eq!(
            router.parse("!lookup Gilgamesh Test Character").unwrap().unwrap(),
            Command::Lookup(LookupRequest::Search {
                world: "Gilgamesh".into(),
                forename: "Test".into(),
                surname: "Character".into(),
            })
        );
        assert_eq!(
            router.parse("!lookupId 12345").unwrap().unwrap(),
            Command::Lookup(LookupRequest::DirectId("12345".into()))
        );
        assert_eq!(
            router.parse("!events").unwrap().unwrap(),
            Command::Announcement("events".into())
        );
        assert!(router.parse("lookup Gilgamesh Test Character").is_none());
        assert!(router.parse("!dance").is_none());
        assert!(router.parse("!lookup Gilgamesh Test").unwrap().is_err());
    }

    #[tokio::test]
    async fn test_bad_arity_replies_without_network() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let router = router_for(&server);
        match router.handle(&message("!lookupId")).await {
            Reply::Failure { kind, .. } => assert_eq!(kind, FailureKind::InvalidArgument),
            other => panic!("expected failure, got {other:?}"),
        }
        match router.handle(&message("!lookup Atlantis Test Character")).await {
            Reply::Failure { kind, message } => {
                assert_eq!(kind, FailureKind::InvalidArgument);
                assert!(message.contains("Atlantis"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_not_found_reply() {
        let server = MockServer::start().await;
        Mock::given(path("/character/99999"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let reply = router_for(&server).handle(&message("!lookupId 99999")).await;
        assert_eq!(
            reply,
            Reply::Failure {
                kind: FailureKind::NotFound,
                message: "User not found".into()
            }
        );
    }

    #[tokio::test]
    async fn test_upstream_fault_reply() {
        let server = MockServer::start().await;
        Mock::given(path("/character/12345"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let reply = router_for(&server).handle(&message("!lookupId 12345")).await;
        let Reply::Failure { kind, message } = reply else {
            panic!("expected failure, got {reply:?}");
        };
        assert_eq!(kind, FailureKind::UpstreamUnavailable);
        assert!(kind.is_retryable());
        assert_eq!(message, kind.user_message());
    }

    #[tokio::test]
    async fn test_lookup_renders_summary() {
        let server = MockServer::start().await;
        Mock::given(path("/character/12345"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Character": {
                    "ID": 12345, "Name": "Test Character", "Nameday": "x", "Avatar": "y",
                    "ActiveClassJob": {"JobID": 19, "Level": 90, "UnlockedState": {"Name": "Paladin"}},
                    "ClassJobs": [{"ClassID": 1, "JobID": 19, "Level": 90}]
                }
            })))
            .mount(&server)
            .await;

        let reply = router_for(&server).handle(&message("!lookupId 12345")).await;
        let Reply::Summary(summary) = reply else {
            panic!("expected summary, got {reply:?}");
        };
        assert_eq!(summary.title, "Test Character");
        assert_eq!(summary.fields[0].value, "PLD Lv.90");
    }

    #[tokio::test]
    async fn test_announcement_reply_and_unknown_ignored() {
        let server = MockServer::start().await;
        let router = router_for(&server);

        let reply = router.handle(&message("!events")).await;
        assert!(matches!(reply, Reply::Text(ref t) if t.contains("events")));
        assert_eq!(router.handle(&message("hello there")).await, Reply::Ignored);
        assert_eq!(router.handle(&message("!")).await, Reply::Ignored);
        assert_eq!(router.command_names()[..2], ["lookup", "lookupId"]);
    }
}
