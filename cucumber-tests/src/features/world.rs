use cucumber::World as CucumberWorld;
use futures::stream;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use switchyard_core::client::{CallHandle, ClientCorrelator};
use switchyard_core::dispatch::{Reply, RequestProcessor};
use switchyard_core::error::{ClientError, RpcError};
use switchyard_core::protocol::{Payload, RequestMethod, Response, ResponseStatus};
use switchyard_core::routing::{
    AccessType, Controller, ParamType, ParameterSpec, RouteDescriptor, RouteTable,
};
use switchyard_core::security::Principal;
use switchyard_core::session::{Session, SessionManager, SessionManagerConfig};

/// Per-session visit counter used by the `visits` route
pub struct Visits(pub u32);

/// Routes every scenario runs against
pub fn demo_routes() -> RouteTable {
    let mut routes = RouteTable::new();

    let auth = Controller::new("auth")
        .route(
            RouteDescriptor::post("login", |args| async move {
                let session = args.session::<Session>("session").ok_or(RpcError::SessionExpired)?;
                let roles: Vec<String> = args.get("roles")?;
                session.login(Principal::new(args.get::<String>("user")?, roles))?;
                Ok(Reply::empty())
            })
            .param(ParameterSpec::session::<Session>("session"))
            .param(ParameterSpec::payload("user", ParamType::Text))
            .param(ParameterSpec::payload("roles", ParamType::List).with_default("[]"))
            .access(AccessType::OnlyNotLoggedIn),
        )
        .route(
            RouteDescriptor::post("logout", |args| async move {
                if let Some(session) = args.session::<Session>("session") {
                    session.destroy();
                }
                Ok(Reply::empty())
            })
            .param(ParameterSpec::session::<Session>("session"))
            .access(AccessType::OnlyLoggedIn),
        );

    let player = Controller::new("player")
        .route(
            RouteDescriptor::get("{playerId}", |args| async move {
                let id: i64 = args.get("playerId")?;
                Reply::value(json!({"playerId": id}))
            })
            .param(ParameterSpec::path("playerId", ParamType::Integer)),
        )
        .route(
            RouteDescriptor::get("{playerId}/items/{itemId}", |args| async move {
                let player: i64 = args.get("playerId")?;
                let item: String = args.get("itemId")?;
                Reply::value(json!({"playerId": player, "itemId": item}))
            })
            .param(ParameterSpec::path("playerId", ParamType::Integer))
            .param(ParameterSpec::path("itemId", ParamType::Text)),
        )
        .route(
            RouteDescriptor::get("me", |_args| async { Reply::value("literal wins") }),
        );

    let register = |routes: &mut RouteTable, route: RouteDescriptor| {
        if let Err(e) = routes.register(route) {
            panic!("demo route rejected: {}", e);
        }
    };

    if let Err(e) = routes.register_controller(auth) {
        panic!("auth controller rejected: {}", e);
    }
    if let Err(e) = routes.register_controller(player) {
        panic!("player controller rejected: {}", e);
    }

    register(
        &mut routes,
        RouteDescriptor::get("admin/stats", |_args| async { Reply::value(json!({"players": 3})) })
            .roles(["admin"]),
    );
    register(
        &mut routes,
        RouteDescriptor::post("greet", |args| async move {
            let name: String = args.get("name")?;
            let punctuation: String = args.get("punctuation")?;
            Reply::value(format!("Hello, {}{}", name, punctuation))
        })
        .param(ParameterSpec::payload("name", ParamType::Text))
        .param(ParameterSpec::payload("punctuation", ParamType::Text).with_default("!")),
    );
    register(
        &mut routes,
        RouteDescriptor::post("score", |args| async move {
            let points: i64 = args.get("points")?;
            if points < 0 {
                return Err(RpcError::Validation(vec!["points must not be negative".to_string()]));
            }
            Reply::value(points * 2)
        })
        .param(ParameterSpec::payload("points", ParamType::Integer)),
    );
    register(
        &mut routes,
        RouteDescriptor::get("visits", |args| async move {
            let session = args.session::<Session>("session").ok_or(RpcError::SessionExpired)?;
            let visits = session
                .compute::<Visits, _>(|current| Some(Visits(current.map_or(1, |v| v.0 + 1))))?
                .map_or(0, |v| v.0);
            Reply::value(visits)
        })
        .param(ParameterSpec::session::<Session>("session")),
    );
    register(
        &mut routes,
        RouteDescriptor::get("ticks/{count}", |args| async move {
            let count: u32 = args.get("count")?;
            Ok(Reply::stream(stream::iter((1..=count).map(Ok))))
        })
        .param(ParameterSpec::path("count", ParamType::Integer)),
    );
    register(
        &mut routes,
        RouteDescriptor::get("ticker", |_args| async {
            let ticks = stream::unfold(0u64, |n| async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Some((Ok(n), n + 1))
            });
            Ok(Reply::stream(ticks))
        }),
    );
    register(
        &mut routes,
        RouteDescriptor::get("broken-stream", |_args| async {
            Ok(Reply::stream(stream::iter(vec![
                Ok(json!(1)),
                Err(RpcError::declared(ResponseStatus::Error, "feed lost")),
            ])))
        }),
    );
    register(
        &mut routes,
        RouteDescriptor::get("slow", |_args| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Reply::value("finally")
        }),
    );
    register(
        &mut routes,
        RouteDescriptor::get("explode", |_args| async { Err(RpcError::internal("boiler pressure")) }),
    );
    register(
        &mut routes,
        RouteDescriptor::get("deferred", |_args| async {
            Ok(Reply::mono(ResponseStatus::Error, Some(json!("not today"))))
        }),
    );

    routes
}

/// Turn a JSON object literal into a request payload
pub fn payload(value: Value) -> Payload {
    value.as_object().cloned().unwrap_or_default()
}

/// Parse a method name as it appears in a frame
pub fn method(name: &str) -> RequestMethod {
    serde_json::from_value(json!(name.to_uppercase()))
        .unwrap_or_else(|_| panic!("unknown request method {}", name))
}

/// Parse a status name as it appears in a frame
pub fn status(name: &str) -> ResponseStatus {
    serde_json::from_value(json!(name)).unwrap_or_else(|_| panic!("unknown response status {}", name))
}

#[derive(CucumberWorld)]
pub struct SwitchyardWorld {
    pub processor: Option<Arc<RequestProcessor>>,
    pub client: Option<Arc<ClientCorrelator>>,
    pub session_id: String,
    // Last single-shot call
    pub last_result: Option<Result<Option<Value>, ClientError>>,
    // Frames produced by feeding the processor directly
    pub raw_responses: Vec<Response>,
    // Stream under test
    pub stream: Option<CallHandle>,
    pub stream_events: Vec<Result<Value, ClientError>>,
    pub stream_completed: bool,
    // Fan-out results: (expected name, outcome)
    pub concurrent_results: Vec<(String, Result<Option<Value>, ClientError>)>,
    // Permission matrix
    pub access: AccessType,
    pub allowed_roles: BTreeSet<String>,
    pub caller: Option<Principal>,
    pub verdict: Option<ResponseStatus>,
}

impl std::fmt::Debug for SwitchyardWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwitchyardWorld")
            .field("processor", &self.processor.as_ref().map(|p| p.stats()))
            .field("client", &"<ClientCorrelator>")
            .field("session_id", &self.session_id)
            .field("last_result", &self.last_result)
            .field("raw_responses", &self.raw_responses)
            .field("stream_events", &self.stream_events)
            .field("stream_completed", &self.stream_completed)
            .field("access", &self.access)
            .field("allowed_roles", &self.allowed_roles)
            .field("verdict", &self.verdict)
            .finish()
    }
}

impl Default for SwitchyardWorld {
    fn default() -> Self {
        Self {
            processor: None,
            client: None,
            session_id: SessionManager::issue_id(),
            last_result: None,
            raw_responses: Vec::new(),
            stream: None,
            stream_events: Vec::new(),
            stream_completed: false,
            concurrent_results: Vec::new(),
            access: AccessType::AllAllowed,
            allowed_roles: BTreeSet::new(),
            caller: None,
            verdict: None,
        }
    }
}

impl SwitchyardWorld {
    /// Wire a processor and a client back to back over in-memory channels
    pub fn connect(&mut self) {
        let sessions =
            SessionManager::with_config(SessionManagerConfig::new().with_auto_cleanup(false));
        let processor = Arc::new(RequestProcessor::new(demo_routes(), Arc::new(sessions)));

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        tokio::spawn(Arc::clone(&processor).serve(request_rx, response_tx));

        let client = Arc::new(ClientCorrelator::new(request_tx, self.session_id.clone()));
        tokio::spawn(Arc::clone(&client).run(response_rx));

        self.processor = Some(processor);
        self.client = Some(client);
    }

    pub fn processor(&self) -> &Arc<RequestProcessor> {
        self.processor.as_ref().expect("no processor: connect the loopback first")
    }

    pub fn client(&self) -> &Arc<ClientCorrelator> {
        self.client.as_ref().expect("no client: connect the loopback first")
    }

    /// The server-side session this world's client talks through
    pub fn session(&self) -> Arc<Session> {
        self.processor().sessions().session(&self.session_id)
    }

    pub async fn call(
        &mut self,
        method: RequestMethod,
        route: &str,
        body: Value,
        timeout: Option<Duration>,
    ) {
        let outcome = match self.client().send(route, payload(body), method, timeout).await {
            Ok(handle) => handle.single().await,
            Err(e) => Err(e),
        };
        self.last_result = Some(outcome);
    }

    pub fn last_result(&self) -> &Result<Option<Value>, ClientError> {
        self.last_result.as_ref().expect("no call was made")
    }
}
