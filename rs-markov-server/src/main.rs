use std::path::{Path, PathBuf};
use std::sync::Mutex;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{get, put, web, App, HttpResponse, HttpServer, Responder};

use log::info;
use serde::{Deserialize, Serialize};

use rs_markov_core::io;
use rs_markov_core::model::transitions::Transitions;
use rs_markov_core::{
	BacktrackLimit, Error, LearningMode, Markov, MarkovState, Session, SessionState, TokenMode,
};

mod config;

use config::ServerConfig;

/// Query parameters for `/v1/chat` and `/v1/respond`.
#[derive(Deserialize)]
struct PromptQuery {
	prompt: Option<String>,
}

/// Query parameters for `/v1/learn`.
#[derive(Deserialize)]
struct LearnQuery {
	prompt: Option<String>,
	response: Option<String>,
}

/// Query parameters for `/v1/configure`. Absent values are left unchanged.
#[derive(Deserialize)]
struct ConfigureQuery {
	mode: Option<TokenMode>,
	backtrack_limit: Option<usize>, // 0 -> unbounded
	response_limit: Option<usize>,  // 0 -> unbounded
	learning_mode: Option<LearningMode>,
}

/// Query parameters for `/v1/associations`.
///
/// `path` is a comma-separated token path; without it, the path is derived
/// from `prompt` the way a reply would start.
#[derive(Deserialize)]
struct AssociationsQuery {
	path: Option<String>,
	prompt: Option<String>,
}

#[derive(Deserialize)]
struct NameQuery {
	name: Option<String>,
}

#[derive(Serialize)]
struct AssociationsView {
	path: Vec<String>,
	continuations: Option<Transitions>,
}

struct SharedData {
	session: Session,
	data_dir: PathBuf,
}

/// Maps a model error onto an HTTP response.
fn error_response(e: &Error) -> HttpResponse {
	match e {
		Error::Exhausted { .. } => HttpResponse::Conflict().body(e.to_string()),
		Error::InvalidState(_) | Error::Config(_) | Error::Json(_) | Error::Binary(_) => {
			HttpResponse::BadRequest().body(e.to_string())
		}
		_ => HttpResponse::InternalServerError().body(e.to_string()),
	}
}

/// Validates a state name coming from a query (no path components).
fn state_name(query: &NameQuery) -> Result<&str, HttpResponse> {
	match query.name.as_deref().map(str::trim) {
		Some(name) if !name.is_empty() && !name.contains(['/', '\\']) && name != ".." => Ok(name),
		_ => Err(HttpResponse::BadRequest().body("Missing or invalid state name")),
	}
}

/// Learns a pair to completion, returning the number of increments.
fn learn_pair(markov: &mut Markov, prompt: &str, response: &str) -> rs_markov_core::Result<usize> {
	let mut learning = markov.learn(prompt, response);
	let planned = learning.step(())?.unwrap_or(0);
	learning.run()?;
	Ok(planned)
}

/// Reads a saved state. Binary files hold a bare model (corpus caches).
fn load_session_state(path: &Path) -> rs_markov_core::Result<SessionState> {
	if path.extension().is_some_and(|ext| ext == io::JSON_EXTENSION) {
		io::load_state(path)
	} else {
		let model: MarkovState = io::load_state(path)?;
		Ok(SessionState { last_prompt: String::new(), model })
	}
}

/// HTTP GET endpoint `/v1/chat`
///
/// Runs a full session turn: learns from the prompt according to the
/// learning mode, then replies. Returns the reply as the response body.
#[get("/v1/chat")]
async fn get_chat(data: web::Data<Mutex<SharedData>>, query: web::Query<PromptQuery>) -> impl Responder {
	let prompt = query.prompt.as_deref().unwrap_or("");

	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	match shared_data.session.turn(prompt).run() {
		Ok(reply) => HttpResponse::Ok().body(reply),
		Err(e) => error_response(&e),
	}
}

/// HTTP GET endpoint `/v1/respond`
///
/// Replies without learning anything.
#[get("/v1/respond")]
async fn get_respond(data: web::Data<Mutex<SharedData>>, query: web::Query<PromptQuery>) -> impl Responder {
	let prompt = query.prompt.as_deref().unwrap_or("");

	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	let markov = shared_data.session.markov_mut();
	let reply: Result<Vec<String>, Error> = markov.respond(prompt).collect();
	match reply {
		Ok(tokens) => HttpResponse::Ok().body(markov.detokenize(&tokens)),
		Err(e) => error_response(&e),
	}
}

#[put("/v1/learn")]
async fn put_learn(data: web::Data<Mutex<SharedData>>, query: web::Query<LearnQuery>) -> impl Responder {
	let response = match &query.response {
		Some(s) if !s.trim().is_empty() => s.as_str(),
		_ => return HttpResponse::BadRequest().body("Missing or empty response"),
	};
	let prompt = query.prompt.as_deref().unwrap_or("");

	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	match learn_pair(shared_data.session.markov_mut(), prompt, response) {
		Ok(increments) => HttpResponse::Ok().body(format!("Learned {increments} associations")),
		Err(e) => error_response(&e),
	}
}

#[put("/v1/configure")]
async fn put_configure(data: web::Data<Mutex<SharedData>>, query: web::Query<ConfigureQuery>) -> impl Responder {
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	let session = &mut shared_data.session;

	let mode = query.mode.unwrap_or(session.markov().mode());
	let limit = query
		.backtrack_limit
		.map_or(session.markov().backtrack_limit(), BacktrackLimit::from_count);
	session.markov_mut().configure(mode, limit);
	if let Some(response_limit) = query.response_limit {
		session.markov_mut().set_response_limit(response_limit);
	}
	if let Some(learning_mode) = query.learning_mode {
		session.set_learning_mode(learning_mode);
	}

	info!("Configured {:?}, learning {:?}", session.markov().config(), session.learning_mode());
	HttpResponse::Ok().json(session.markov().config())
}

/// HTTP GET endpoint `/v1/associations`
///
/// Read-only view of the continuations known after a token path, for
/// visualizers walking the association graph.
#[get("/v1/associations")]
async fn get_associations(data: web::Data<Mutex<SharedData>>, query: web::Query<AssociationsQuery>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	let markov = shared_data.session.markov();

	let path: Vec<String> = match (&query.path, &query.prompt) {
		(Some(path), _) => path.split(',').filter(|t| !t.is_empty()).map(str::to_owned).collect(),
		(None, Some(prompt)) => markov.focus_path(prompt),
		(None, None) => markov.focus_path(""),
	};
	let continuations = markov.continuations(&path).cloned();

	HttpResponse::Ok().json(AssociationsView { path, continuations })
}

#[get("/v1/state")]
async fn get_state(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	HttpResponse::Ok().json(shared_data.session.export_state())
}

#[put("/v1/state")]
async fn put_state(data: web::Data<Mutex<SharedData>>, state: web::Json<SessionState>) -> impl Responder {
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	match shared_data.session.import_state(state.into_inner()) {
		Ok(()) => HttpResponse::Ok().body("State imported"),
		Err(e) => error_response(&e),
	}
}

#[put("/v1/reset")]
async fn put_reset(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	shared_data.session.markov_mut().reset();
	HttpResponse::Ok().body("Model reset")
}

/// HTTP GET endpoint `/v1/models`
///
/// Lists the saved states available in the data directory, one per line.
#[get("/v1/models")]
async fn get_models(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let data_dir = match data.lock() {
		Ok(m) => m.data_dir.clone(),
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	match io::list_states(&data_dir) {
		Ok(names) => HttpResponse::Ok().body(names.join("\n")),
		Err(_) => HttpResponse::InternalServerError().body("Failed to list models"),
	}
}

#[put("/v1/save")]
async fn put_save(data: web::Data<Mutex<SharedData>>, query: web::Query<NameQuery>) -> impl Responder {
	let name = match state_name(&query) {
		Ok(name) => name,
		Err(response) => return response,
	};
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	let path = shared_data.data_dir.join(format!("{name}.{}", io::JSON_EXTENSION));
	match io::save_state(&path, &shared_data.session.export_state()) {
		Ok(()) => HttpResponse::Ok().body(format!("Saved {}", path.display())),
		Err(e) => error_response(&e),
	}
}

#[put("/v1/load")]
async fn put_load(data: web::Data<Mutex<SharedData>>, query: web::Query<NameQuery>) -> impl Responder {
	let name = match state_name(&query) {
		Ok(name) => name,
		Err(response) => return response,
	};
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	let path = match io::find_state(&shared_data.data_dir, name) {
		Some(path) => path,
		None => return HttpResponse::NotFound().body(format!("No saved state named {name}")),
	};
	let result = load_session_state(&path).and_then(|state| shared_data.session.import_state(state));
	match result {
		Ok(()) => HttpResponse::Ok().body("Model loaded successfully"),
		Err(e) => error_response(&e),
	}
}

/// Registers every endpoint.
fn routes(cfg: &mut web::ServiceConfig) {
	cfg.service(get_chat)
		.service(get_respond)
		.service(put_learn)
		.service(put_configure)
		.service(get_associations)
		.service(get_state)
		.service(put_state)
		.service(put_reset)
		.service(get_models)
		.service(put_save)
		.service(put_load);
}

/// Builds the session the server starts with.
fn initial_session(config: &ServerConfig) -> rs_markov_core::Result<Session> {
	let mut session = match &config.corpus_path {
		Some(corpus) => Session::from_corpus(corpus, config.model)?,
		None => Session::new(Markov::new(config.model), config.learning_mode),
	};
	session.set_learning_mode(config.learning_mode);
	Ok(session)
}

/// Main entry point for the server.
///
/// Loads the configuration, builds the session (optionally from a corpus),
/// wraps it in a `Mutex` and starts an Actix-web HTTP server.
///
/// # Notes
/// - The server binds to 127.0.0.1:5000 unless configured otherwise.
/// - Every request drives its procedure to completion while holding the lock.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let config = ServerConfig::load().map_err(std::io::Error::other)?;
	std::fs::create_dir_all(&config.data_dir)?;
	let session = initial_session(&config).map_err(std::io::Error::other)?;
	info!(
		"Starting with {} known contexts, {:?} learning",
		session.markov().associations().len(),
		session.learning_mode()
	);

	let shared_data = SharedData {
		session,
		data_dir: config.data_dir.clone(),
	};
	let shared_model = web::Data::new(Mutex::new(shared_data));
	let json_limit = config.json_limit;

	HttpServer::new(move || {
		App::new()
			.wrap(Logger::default())
			.wrap(Cors::permissive())
			.app_data(web::JsonConfig::default().limit(json_limit))
			.app_data(shared_model.clone())
			.configure(routes)
	})
		.bind((config.bind.as_str(), config.port))?
		.run()
		.await
}
