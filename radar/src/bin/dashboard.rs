//! Market Radar Dashboard
//!
//! Web UI for the market audit pipeline: business/category search, candidate
//! confirmation, and the full audit (table, KPIs, charts, AI reports).
//! Session state lives in memory, keyed by UUID, one entry per browser tab.
//!
//! Usage: cargo run --bin dashboard
//! Then open http://localhost:3000

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use market_radar::analyzer::gemini::GeminiClient;
use market_radar::categories;
use market_radar::config::Config;
use market_radar::email::LeadNotifier;
use market_radar::pipeline::{self, AuditError, AuditRequest, AuditTarget};
use market_radar::places::PlacesClient;
use market_radar::review_file;
use market_radar::session::{SearchMode, SessionState};
use market_radar::types::MarketReport;

// ── State ──

struct AppState {
    places: PlacesClient,
    gemini: GeminiClient,
    notifier: LeadNotifier,
    default_radius_km: f64,
    sessions: Mutex<HashMap<Uuid, SessionState>>,
}

type Shared = Arc<AppState>;

// ── Wire types ──

#[derive(Serialize)]
struct SessionCreated {
    session_id: Uuid,
}

#[derive(Deserialize)]
struct SearchBody {
    session_id: Uuid,
    query: String,
}

#[derive(Serialize)]
struct SearchResult {
    candidates: Vec<CandidateView>,
}

#[derive(Serialize)]
struct CandidateView {
    name: String,
    formatted_address: String,
}

#[derive(Deserialize)]
struct ValidateBody {
    session_id: Uuid,
    address: String,
    categories: Vec<String>,
}

#[derive(Serialize)]
struct ValidateResult {
    formatted_address: String,
}

#[derive(Deserialize)]
struct AuditBody {
    session_id: Uuid,
    email: String,
    candidate_index: Option<usize>,
    radius_km: Option<f64>,
    /// Raw CSV text of the user's own reviews, if uploaded
    reviews_csv: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody { error: msg.into() }))
}

// ── Handlers ──

async fn serve_html() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn api_categories() -> Json<&'static [&'static str]> {
    Json(categories::catalog())
}

async fn api_session(State(state): State<Shared>) -> Json<SessionCreated> {
    let id = Uuid::new_v4();
    state.sessions.lock().await.insert(id, SessionState::default());
    Json(SessionCreated { session_id: id })
}

async fn api_search(
    State(state): State<Shared>,
    Json(body): Json<SearchBody>,
) -> Result<Json<SearchResult>, ApiError> {
    if body.query.trim().len() < 3 {
        return Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, "Query is too short"));
    }

    let candidates = state.places.resolve_by_name(&body.query).await.map_err(|e| {
        error!("Business search failed: {e}");
        api_error(StatusCode::BAD_GATEWAY, format!("Places provider error: {e}"))
    })?;

    let mut sessions = state.sessions.lock().await;
    let session = sessions
        .get_mut(&body.session_id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Unknown session"))?;
    session.begin_business_search(candidates.clone());

    Ok(Json(SearchResult {
        candidates: candidates
            .into_iter()
            .map(|c| CandidateView {
                name: c.name,
                formatted_address: c.formatted_address,
            })
            .collect(),
    }))
}

async fn api_validate(
    State(state): State<Shared>,
    Json(body): Json<ValidateBody>,
) -> Result<Json<ValidateResult>, ApiError> {
    if body.address.trim().len() < 6 {
        return Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, "Address is too short"));
    }
    if body.categories.is_empty() {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Pick at least one category",
        ));
    }

    let validated = state
        .places
        .resolve_by_address(&body.address)
        .await
        .map_err(|e| {
            error!("Address validation failed: {e}");
            api_error(StatusCode::BAD_GATEWAY, format!("Places provider error: {e}"))
        })?
        .ok_or_else(|| {
            api_error(StatusCode::UNPROCESSABLE_ENTITY, "Could not validate that address")
        })?;

    let formatted = validated.formatted_address.clone();
    let mut sessions = state.sessions.lock().await;
    let session = sessions
        .get_mut(&body.session_id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Unknown session"))?;
    session.begin_category_search(validated, body.categories);

    Ok(Json(ValidateResult { formatted_address: formatted }))
}

async fn api_audit(
    State(state): State<Shared>,
    Json(body): Json<AuditBody>,
) -> Result<Json<MarketReport>, ApiError> {
    if !body.email.contains('@') {
        return Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, "Enter a valid email"));
    }

    // Snapshot what the audit needs, then release the session lock before the
    // long provider chain runs.
    let target = {
        let sessions = state.sessions.lock().await;
        let session = sessions
            .get(&body.session_id)
            .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Unknown session"))?;

        match session.mode {
            Some(SearchMode::Business) => {
                let index = body.candidate_index.unwrap_or(0);
                let candidate = session.candidates.get(index).ok_or_else(|| {
                    api_error(StatusCode::UNPROCESSABLE_ENTITY, "Candidate selection out of range")
                })?;
                AuditTarget::Business(candidate.clone())
            }
            Some(SearchMode::Category) => {
                let center = session.validated_address.clone().ok_or_else(|| {
                    api_error(StatusCode::UNPROCESSABLE_ENTITY, "Validate an address first")
                })?;
                AuditTarget::Area {
                    center,
                    categories: session.categories.clone(),
                }
            }
            None => {
                return Err(api_error(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "Run a search before auditing",
                ))
            }
        }
    };

    let own_reviews = match &body.reviews_csv {
        Some(csv_text) => match review_file::extract_reviews(Cursor::new(csv_text)) {
            Ok(reviews) => {
                if reviews.is_empty() {
                    warn!("Uploaded CSV had no recognizable review column");
                }
                reviews
            }
            Err(e) => {
                return Err(api_error(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    format!("Invalid review file: {e}"),
                ))
            }
        },
        None => Vec::new(),
    };

    let request = AuditRequest {
        target,
        radius_km: body.radius_km.unwrap_or(state.default_radius_km),
        user_email: body.email,
        own_reviews,
    };

    let report = pipeline::run_audit(&state.places, &state.gemini, &state.notifier, request)
        .await
        .map_err(|e| match e {
            AuditError::TargetNotFound | AuditError::EmptyMarket => {
                api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            AuditError::Provider(cause) => {
                error!("Audit provider failure: {cause}");
                api_error(StatusCode::BAD_GATEWAY, format!("Places provider error: {cause}"))
            }
        })?;

    Ok(Json(report))
}

// ── Entry ──

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = Config::from_env().expect("load config");
    if cfg.places_api_key.is_empty() {
        error!("PLACES_API_KEY must be set");
        std::process::exit(1);
    }
    if cfg.gemini_api_key.is_empty() {
        warn!("GEMINI_API_KEY not set — narratives will degrade to placeholders");
    }

    let state = Arc::new(AppState {
        places: PlacesClient::new(&cfg.places_api_key, &cfg.language_code),
        gemini: GeminiClient::new(&cfg.gemini_api_key),
        notifier: LeadNotifier::new(
            &cfg.smtp_host, cfg.smtp_port, &cfg.smtp_user, &cfg.smtp_pass,
            &cfg.lead_from, &cfg.lead_to,
        ),
        default_radius_km: cfg.default_radius_km,
        sessions: Mutex::new(HashMap::new()),
    });

    let app = Router::new()
        .route("/", get(serve_html))
        .route("/api/categories", get(api_categories))
        .route("/api/session", post(api_session))
        .route("/api/search", post(api_search))
        .route("/api/validate", post(api_validate))
        .route("/api/audit", post(api_audit))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", cfg.dashboard_port);
    info!("Market Radar dashboard on http://localhost:{}", cfg.dashboard_port);
    let listener = tokio::net::TcpListener::bind(&addr).await.expect("bind dashboard port");
    axum::serve(listener, app).await.expect("serve dashboard");
}

// ── UI ──

const DASHBOARD_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Market Radar</title>
<meta name="viewport" content="width=device-width, initial-scale=1">
<style>
  :root { color-scheme: dark; }
  * { box-sizing: border-box; margin: 0; }
  body { background:#0d1117; color:#c9d1d9; font:14px/1.5 -apple-system,'Segoe UI',Roboto,sans-serif; padding:24px; max-width:1100px; margin:0 auto; }
  h1 { font-size:22px; margin-bottom:4px; }
  .subtitle { color:#8b949e; margin-bottom:20px; }
  .card { background:#161b22; border:1px solid #30363d; border-radius:8px; padding:16px; margin-bottom:16px; }
  label { display:block; color:#8b949e; font-size:12px; margin:8px 0 4px; }
  input, select { width:100%; background:#0d1117; color:#c9d1d9; border:1px solid #30363d; border-radius:6px; padding:8px; }
  input:focus, select:focus { outline:none; border-color:#58a6ff; }
  button { background:#238636; color:#fff; border:0; border-radius:6px; padding:9px 16px; cursor:pointer; font-weight:600; margin-top:12px; }
  button:disabled { background:#30363d; cursor:wait; }
  .tabs { display:flex; gap:8px; margin-bottom:12px; }
  .tab { padding:7px 14px; border-radius:6px; border:1px solid #30363d; cursor:pointer; color:#8b949e; }
  .tab.active { color:#c9d1d9; border-color:#58a6ff; }
  .row { display:flex; gap:12px; }
  .row > div { flex:1; }
  .kpis { display:grid; grid-template-columns:repeat(5,1fr); gap:12px; margin-bottom:16px; }
  .kpi { background:#161b22; border:1px solid #30363d; border-radius:8px; padding:12px; text-align:center; }
  .kpi .value { font-size:20px; font-weight:700; color:#58a6ff; }
  .kpi .label { font-size:11px; color:#8b949e; }
  table { width:100%; border-collapse:collapse; font-size:13px; }
  th, td { text-align:left; padding:7px 8px; border-bottom:1px solid #21262d; }
  th { color:#8b949e; font-weight:600; }
  .target-row { background:#13233a; }
  .badge { font-size:10px; padding:2px 6px; border-radius:10px; }
  .badge.target { background:#1f6feb33; color:#58a6ff; }
  .badge.competitor { background:#30363d; color:#8b949e; }
  .charts { display:flex; gap:16px; }
  .charts .card { flex:1; }
  .warn { color:#d29922; }
  .error { color:#f85149; margin-top:8px; }
  #report, #gap { white-space:normal; }
  #report h2, #gap h2 { font-size:17px; margin:14px 0 6px; }
  #report h3, #gap h3 { font-size:14px; margin:10px 0 4px; color:#8b949e; }
  #report li, #gap li { margin-left:18px; }
  .hidden { display:none; }
  a { color:#58a6ff; text-decoration:none; }
  .degraded { font-size:11px; color:#d29922; }
</style>
</head>
<body>
  <h1>&#128202; Market Radar</h1>
  <div class="subtitle">Market expectations and customer-experience radar.</div>

  <div class="card" id="gate">
    <label>Your email (unlocks the radar)</label>
    <input id="email" type="email" placeholder="you@company.com">
  </div>

  <div class="card">
    <div class="tabs">
      <div class="tab active" id="tab-business" onclick="setTab('business')">&#127970; Business search</div>
      <div class="tab" id="tab-category" onclick="setTab('category')">&#128205; Category search</div>
    </div>

    <div id="pane-business">
      <div class="row">
        <div>
          <label>Business name</label>
          <input id="q-business" placeholder="e.g. Poet's Bakery, Old Town">
        </div>
        <div style="max-width:140px">
          <label>Radius (km)</label>
          <input id="r-business" type="number" min="0.1" max="10" step="0.5" value="2.5">
        </div>
      </div>
      <button onclick="searchBusiness()" id="btn-search">&#128640; Start competition radar</button>
      <div id="candidates" class="hidden">
        <label>Select your business</label>
        <select id="candidate-select"></select>
        <button onclick="runAudit()" id="btn-audit-b">Confirm &amp; analyze</button>
      </div>
      <label style="margin-top:14px">Optional: upload your own reviews (CSV) for a private gap analysis</label>
      <input id="reviews-file" type="file" accept=".csv">
    </div>

    <div id="pane-category" class="hidden">
      <div class="row">
        <div>
          <label>Center address</label>
          <input id="q-address" placeholder="e.g. 5000 Colon Ave">
        </div>
        <div>
          <label>Category</label>
          <select id="category-select"></select>
        </div>
        <div style="max-width:140px">
          <label>Radius (km)</label>
          <input id="r-category" type="number" min="0.1" max="10" step="0.5" value="2.0">
        </div>
      </div>
      <button onclick="validateAddress()" id="btn-validate">&#128640; Start competition radar</button>
      <div id="validated" class="hidden">
        <p style="margin-top:10px">&#128205; Validated: <span id="validated-address"></span></p>
        <button onclick="runAudit()" id="btn-audit-c">Confirm &amp; analyze</button>
      </div>
    </div>
    <div id="form-error" class="error hidden"></div>
  </div>

  <div id="results" class="hidden">
    <div class="kpis" id="kpis"></div>
    <div class="card">
      <h2 id="market-title"></h2>
      <table>
        <thead><tr><th>Business</th><th>&#11088;</th><th>Reviews</th><th>Type</th><th>AI summary</th><th>Maps</th></tr></thead>
        <tbody id="market-body"></tbody>
      </table>
    </div>
    <div class="charts">
      <div class="card">
        <h2>&#127919; Quality vs maturity</h2>
        <canvas id="scatter" width="560" height="300"></canvas>
      </div>
      <div class="card">
        <h2>&#128483; Share of voice</h2>
        <svg id="donut" viewBox="0 0 120 120" width="240" height="240"></svg>
        <div id="donut-legend"></div>
        <div id="donut-degraded" class="degraded hidden">Classification unavailable — default split shown</div>
      </div>
    </div>
    <div class="card"><h2>&#129504; Market intelligence</h2><div id="report"></div></div>
    <div class="card hidden" id="gap-card"><h2>&#9878;&#65039; Private audit</h2><div id="gap"></div></div>
  </div>

<script>
let sessionId = null;
let mode = 'business';

async function api(path, body) {
  const resp = await fetch('/api/' + path, {
    method: body === undefined ? 'GET' : 'POST',
    headers: {'Content-Type': 'application/json'},
    body: body === undefined ? undefined : JSON.stringify(body),
  });
  const data = await resp.json();
  if (!resp.ok) throw new Error(data.error || ('HTTP ' + resp.status));
  return data;
}

function esc(s) {
  return String(s ?? '').replace(/&/g,'&amp;').replace(/</g,'&lt;').replace(/>/g,'&gt;');
}

function showError(msg) {
  const el = document.getElementById('form-error');
  el.textContent = msg;
  el.classList.remove('hidden');
}
function clearError() { document.getElementById('form-error').classList.add('hidden'); }

function setTab(next) {
  mode = next;
  document.getElementById('tab-business').classList.toggle('active', next === 'business');
  document.getElementById('tab-category').classList.toggle('active', next === 'category');
  document.getElementById('pane-business').classList.toggle('hidden', next !== 'business');
  document.getElementById('pane-category').classList.toggle('hidden', next !== 'category');
  clearError();
}

function requireEmail() {
  const email = document.getElementById('email').value.trim();
  if (!email.includes('@')) { showError('Enter your email first.'); return null; }
  return email;
}

async function ensureSession() {
  if (!sessionId) sessionId = (await api('session', {})).session_id;
  return sessionId;
}

async function searchBusiness() {
  clearError();
  if (!requireEmail()) return;
  const query = document.getElementById('q-business').value.trim();
  const btn = document.getElementById('btn-search');
  btn.disabled = true;
  try {
    await ensureSession();
    const res = await api('search', {session_id: sessionId, query});
    if (res.candidates.length === 0) { showError('No results found.'); return; }
    const select = document.getElementById('candidate-select');
    select.innerHTML = res.candidates.map((c, i) =>
      '<option value="' + i + '">' + esc(c.name) + ' - ' + esc(c.formatted_address) + '</option>').join('');
    document.getElementById('candidates').classList.remove('hidden');
  } catch (e) { showError(e.message); }
  finally { btn.disabled = false; }
}

async function validateAddress() {
  clearError();
  if (!requireEmail()) return;
  const address = document.getElementById('q-address').value.trim();
  const category = document.getElementById('category-select').value;
  const btn = document.getElementById('btn-validate');
  btn.disabled = true;
  try {
    await ensureSession();
    const res = await api('validate', {session_id: sessionId, address, categories: [category]});
    document.getElementById('validated-address').textContent = res.formatted_address;
    document.getElementById('validated').classList.remove('hidden');
  } catch (e) { showError(e.message); }
  finally { btn.disabled = false; }
}

function readReviewsFile() {
  return new Promise((resolve) => {
    const input = document.getElementById('reviews-file');
    if (!input.files || input.files.length === 0) return resolve(null);
    const reader = new FileReader();
    reader.onload = () => resolve(reader.result);
    reader.onerror = () => resolve(null);
    reader.readAsText(input.files[0]);
  });
}

async function runAudit() {
  clearError();
  const email = requireEmail();
  if (!email) return;
  const radius = parseFloat(mode === 'business'
    ? document.getElementById('r-business').value
    : document.getElementById('r-category').value) || 2.5;
  const body = {session_id: sessionId, email, radius_km: radius};
  if (mode === 'business') {
    body.candidate_index = parseInt(document.getElementById('candidate-select').value, 10) || 0;
    body.reviews_csv = await readReviewsFile();
  }
  const buttons = [document.getElementById('btn-audit-b'), document.getElementById('btn-audit-c')];
  buttons.forEach(b => b.disabled = true);
  try {
    render(await api('audit', body));
  } catch (e) { showError(e.message); }
  finally { buttons.forEach(b => b.disabled = false); }
}

function render(report) {
  document.getElementById('results').classList.remove('hidden');
  document.getElementById('market-title').textContent = '\u{1F4CD} Market radar: ' + report.category_label;

  const m = report.metrics;
  const countLabel = m.count >= 20 ? '20 (API max)' : String(m.count);
  document.getElementById('kpis').innerHTML = [
    [countLabel, 'Businesses on radar'],
    [m.simple_average_rating.toFixed(2) + ' ⭐', 'Average rating'],
    [m.weighted_average_rating.toFixed(2) + ' ⭐', 'Weighted rating'],
    [m.total_review_count.toLocaleString(), 'Historic volume'],
    [String(m.reviews_sampled), 'Reviews analyzed'],
  ].map(([v, l]) => '<div class="kpi"><div class="value">' + v + '</div><div class="label">' + l + '</div></div>').join('');

  document.getElementById('market-body').innerHTML = report.rows.map(r =>
    '<tr class="' + (r.kind === 'target' ? 'target-row' : '') + '">' +
    '<td>' + esc(r.name) + '</td>' +
    '<td>' + r.rating.toFixed(1) + '</td>' +
    '<td>' + r.review_count + '</td>' +
    '<td><span class="badge ' + r.kind + '">' + (r.kind === 'target' ? 'MY BUSINESS' : 'COMPETITOR') + '</span></td>' +
    '<td>' + esc(r.summary) + '</td>' +
    '<td><a href="' + esc(r.maps_link) + '" target="_blank">View</a></td>' +
    '</tr>').join('');

  drawScatter(report.rows);
  drawDonut(report.topics);

  document.getElementById('report').innerHTML = mdToHtml(report.executive_report);
  const gapCard = document.getElementById('gap-card');
  if (report.gap_report) {
    gapCard.classList.remove('hidden');
    document.getElementById('gap').innerHTML = mdToHtml(report.gap_report);
  } else {
    gapCard.classList.add('hidden');
  }
  document.getElementById('results').scrollIntoView({behavior: 'smooth'});
}

function drawScatter(rows) {
  const canvas = document.getElementById('scatter');
  const ctx = canvas.getContext('2d');
  ctx.clearRect(0, 0, canvas.width, canvas.height);
  const pad = 36;
  const maxCount = Math.max(10, ...rows.map(r => r.review_count));
  const x = c => pad + (Math.log10(c + 1) / Math.log10(maxCount + 1)) * (canvas.width - 2 * pad);
  const y = rt => canvas.height - pad - ((Math.max(rt, 3.0) - 3.0) / 2.4) * (canvas.height - 2 * pad);
  ctx.strokeStyle = '#30363d';
  ctx.strokeRect(pad, pad / 2, canvas.width - 2 * pad, canvas.height - 1.5 * pad);
  ctx.fillStyle = '#8b949e';
  ctx.font = '10px sans-serif';
  ctx.fillText('reviews (log)', canvas.width / 2 - 24, canvas.height - 8);
  for (const r of rows) {
    ctx.beginPath();
    ctx.fillStyle = r.kind === 'target' ? '#1E88E5' : '#90A4AE';
    ctx.arc(x(r.review_count), y(r.rating), 6, 0, Math.PI * 2);
    ctx.fill();
    ctx.fillStyle = '#c9d1d9';
    ctx.fillText(r.name.slice(0, 14), x(r.review_count) - 20, y(r.rating) - 10);
  }
}

function drawDonut(topics) {
  const parts = [
    ['Quality', topics.quality, '#66BB6A'],
    ['Value', topics.value, '#FFA726'],
    ['Service', topics.service, '#42A5F5'],
  ];
  const total = parts.reduce((acc, p) => acc + p[1], 0) || 1;
  const c = 2 * Math.PI * 42;
  let offset = 0;
  const svg = parts.map(([name, value, color]) => {
    const frac = value / total;
    const seg = '<circle r="42" cx="60" cy="60" fill="none" stroke="' + color + '" stroke-width="18" ' +
      'stroke-dasharray="' + (frac * c) + ' ' + c + '" stroke-dashoffset="' + (-offset * c) + '" ' +
      'transform="rotate(-90 60 60)"/>';
    offset += frac;
    return seg;
  }).join('');
  document.getElementById('donut').innerHTML = svg;
  document.getElementById('donut-legend').innerHTML = parts.map(([name, value, color]) =>
    '<span style="color:' + color + '">&#9632;</span> ' + name + ' ' + value + '%').join(' &nbsp; ');
  document.getElementById('donut-degraded').classList.toggle('hidden', !topics.degraded);
}

function mdToHtml(md) {
  return esc(md)
    .replace(/^### (.*)$/gm, '<h3>$1</h3>')
    .replace(/^## (.*)$/gm, '<h2>$1</h2>')
    .replace(/\*\*(.+?)\*\*/g, '<b>$1</b>')
    .replace(/^\* (.*)$/gm, '<li>$1</li>')
    .replace(/^[0-9]+\. +(.*)$/gm, '<li>$1</li>')
    .replace(/\n{2,}/g, '<br><br>')
    .replace(/\n/g, '<br>');
}

(async function init() {
  const select = document.getElementById('category-select');
  try {
    const cats = await api('categories');
    select.innerHTML = cats.map(c => '<option>' + esc(c) + '</option>').join('');
  } catch (e) {
    select.innerHTML = '<option>Restaurant</option>';
  }
})();
</script>
</body>
</html>"##;
