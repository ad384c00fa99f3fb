use std::net::SocketAddr;
use std::sync::Arc;

use colored::*;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crate::error::DebuggerError;
use crate::handlers;
use crate::http::{read_request, HttpRequest, HttpResponse};
use crate::model::RequestRecord;
use crate::state::AppState;

/// Embedded landing page: snapshot list, per-snapshot actions, and the
/// introspection counters.
pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Snapshot Debugger</title>
<style>
*{margin:0;padding:0;box-sizing:border-box}
body{background:#0d1117;color:#c9d1d9;font-family:'Cascadia Code','Fira Code',monospace;min-height:100vh;display:flex;flex-direction:column}
header{padding:16px 24px;border-bottom:1px solid #21262d;display:flex;align-items:center;justify-content:space-between}
header h1{font-size:1.2rem;color:#58a6ff}
.stats{display:flex;gap:18px;padding:12px 24px;border-bottom:1px solid #21262d;background:#161b22;font-size:.8rem;color:#8b949e}
.stats b{color:#c9d1d9}
.btn{border:none;padding:6px 14px;border-radius:6px;font-family:inherit;font-size:.85rem;cursor:pointer;color:#fff}
.btn-go{background:#238636}.btn-go:hover{background:#2ea043}
.btn-mode{background:#30363d}.btn-mode:hover{background:#484f58}
.btn-export{background:#6e40c9}.btn-export:hover{background:#8957e5}
.btn-danger{background:#da3633}.btn-danger:hover{background:#f85149}
main{flex:1;padding:16px 24px;overflow:auto}
table{width:100%;border-collapse:collapse;font-size:.85rem}
th{text-align:left;font-size:.7rem;color:#8b949e;text-transform:uppercase;letter-spacing:.5px;padding:6px 8px;border-bottom:1px solid #30363d}
td{padding:6px 8px;border-bottom:1px solid #21262d;vertical-align:top}
.tag{display:inline-block;background:#1f6feb;color:#fff;border-radius:10px;padding:0 8px;margin-right:4px;font-size:.7rem}
.err{color:#f85149;font-weight:bold}
.ok{color:#3fb950}
.actions{display:flex;gap:6px;flex-wrap:wrap}
pre#out{margin-top:16px;background:#0a0e14;border:1px solid #21262d;border-radius:6px;padding:12px;white-space:pre-wrap;word-wrap:break-word;font-size:.8rem;min-height:60px}
.empty{color:#484f58;padding:24px 0}
</style>
</head>
<body>
<header>
  <h1>Snapshot Debugger</h1>
  <div class="actions">
    <button class="btn btn-go" id="refresh">Refresh</button>
    <a class="btn btn-export" href="/debug/export-logs">Export logs</a>
    <button class="btn btn-danger" id="clear">Clear logs</button>
  </div>
</header>
<div class="stats" id="stats">
  <span>snapshots <b id="s-snaps">0</b></span>
  <span>requests <b id="s-reqs">0</b></span>
  <span>errors <b id="s-errs">0</b></span>
  <span>error rate <b id="s-rate">0</b>%</span>
  <span>uptime <b id="s-up">0</b>s</span>
</div>
<main>
  <table>
    <thead><tr><th>Label</th><th>Path</th><th>Tags</th><th>Errors</th><th>Captured</th><th></th></tr></thead>
    <tbody id="rows"></tbody>
  </table>
  <div class="empty" id="empty">No snapshots yet. POST to /snapshot or /snapshot/manual.</div>
  <pre id="out"></pre>
</main>
<script>
const $ = id => document.getElementById(id);
function esc(s){return String(s).replace(/[&<>"]/g,c=>({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;'}[c]));}
async function show(resp){
  const text = await resp.text();
  try { $('out').textContent = JSON.stringify(JSON.parse(text), null, 2); }
  catch(_) { $('out').textContent = text; }
}
async function loadStats(){
  const s = await (await fetch('/debug/stats')).json();
  $('s-snaps').textContent = s.total_snapshots;
  $('s-reqs').textContent = s.total_requests;
  $('s-errs').textContent = s.total_errors;
  $('s-rate').textContent = Number(s.error_rate).toFixed(1);
  $('s-up').textContent = Math.round(s.uptime);
}
async function loadSnapshots(){
  const list = await (await fetch('/snapshots')).json();
  $('empty').style.display = list.length ? 'none' : 'block';
  $('rows').innerHTML = list.map(s => `<tr>
    <td>${esc(s.label)}</td>
    <td>${esc(s.path)}</td>
    <td>${s.tags.map(t=>`<span class="tag">${esc(t)}</span>`).join('')}</td>
    <td class="${s.has_errors?'err':'ok'}">${s.error_count}</td>
    <td>${new Date(s.timestamp*1000).toLocaleString()}</td>
    <td class="actions">
      <button class="btn btn-mode" data-act="view" data-id="${s.id}">View</button>
      <button class="btn btn-go" data-act="replay" data-id="${s.id}">Replay</button>
      <a class="btn btn-export" href="/snapshot/${s.id}/generate-test">Test</a>
      <a class="btn btn-mode" href="/snapshot/${s.id}/export">Export</a>
      <button class="btn btn-danger" data-act="delete" data-id="${s.id}">Delete</button>
    </td></tr>`).join('');
}
async function refresh(){ await Promise.all([loadSnapshots(), loadStats()]); }
$('rows').addEventListener('click', async e => {
  const b = e.target.closest('button'); if(!b) return;
  const id = b.dataset.id;
  if(b.dataset.act === 'view') await show(await fetch(`/snapshot/${id}`));
  if(b.dataset.act === 'replay') await show(await fetch(`/snapshot/${id}/replay`, {method:'POST'}));
  if(b.dataset.act === 'delete') { await show(await fetch(`/snapshot/${id}`, {method:'DELETE'})); await refresh(); }
});
$('refresh').onclick = refresh;
$('clear').onclick = async () => { await show(await fetch('/debug/clear-logs', {method:'POST'})); await refresh(); };
refresh();
</script>
</body>
</html>
"##;

/// A resolved route, independent of method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route<'a> {
    Index,
    Capture,
    Manual,
    Snapshot(&'a str),
    Export(&'a str),
    Expected(&'a str),
    Replay(&'a str),
    GenerateTest(&'a str),
    Tag(&'a str),
    List,
    DebugErrors,
    DebugRequests,
    DebugStats,
    ClearLogs,
    ExportLogs,
}

fn resolve(path: &str) -> Option<Route<'_>> {
    let segments: Vec<&str> = path.trim_end_matches('/').split('/').skip(1).collect();
    let route = match segments.as_slice() {
        [] | [""] => Route::Index,
        ["snapshot"] => Route::Capture,
        ["snapshot", "manual"] => Route::Manual,
        ["snapshot", id] => Route::Snapshot(id),
        ["snapshot", id, "export"] => Route::Export(id),
        ["snapshot", id, "expected"] => Route::Expected(id),
        ["snapshot", id, "replay"] => Route::Replay(id),
        ["snapshot", id, "generate-test"] => Route::GenerateTest(id),
        ["snapshot", id, "tag"] => Route::Tag(id),
        ["snapshots"] => Route::List,
        ["debug", "errors"] => Route::DebugErrors,
        ["debug", "requests"] => Route::DebugRequests,
        ["debug", "stats"] => Route::DebugStats,
        ["debug", "clear-logs"] => Route::ClearLogs,
        ["debug", "export-logs"] => Route::ExportLogs,
        _ => return None,
    };
    Some(route)
}

fn is_introspection(path: &str) -> bool {
    path == "/debug" || path.starts_with("/debug/")
}

/// Dispatch a resolved route.  `Ok(None)` means the method is not allowed.
fn dispatch(
    state: &AppState,
    req: &HttpRequest,
    route: Route<'_>,
    live: Option<RequestRecord>,
) -> Result<Option<HttpResponse>, DebuggerError> {
    let method = req.method.as_str();
    let resp = match (method, route) {
        ("GET", Route::Index) => HttpResponse::html(INDEX_HTML),
        ("POST", Route::Capture) => {
            let live = live.unwrap_or_else(|| req.to_record(&state.config));
            handlers::create_snapshot(state, req, live)?
        }
        ("POST", Route::Manual) => handlers::create_manual_snapshot(state, req)?,
        ("GET", Route::Snapshot(id)) => handlers::get_snapshot(state, id)?,
        ("DELETE", Route::Snapshot(id)) => handlers::delete_snapshot(state, id)?,
        ("GET", Route::Export(id)) => handlers::export_snapshot(state, id)?,
        ("POST", Route::Expected(id)) => handlers::set_expected_output(state, req, id)?,
        ("POST", Route::Replay(id)) => handlers::replay_snapshot(state, id)?,
        ("GET", Route::GenerateTest(id)) => handlers::generate_test(state, id)?,
        ("POST", Route::Tag(id)) => handlers::tag_snapshot(state, req, id)?,
        ("GET", Route::List) => handlers::list_snapshots(state)?,
        ("GET", Route::DebugErrors) => handlers::debug_errors(state)?,
        ("GET", Route::DebugRequests) => handlers::debug_requests(state)?,
        ("GET", Route::DebugStats) => handlers::debug_stats(state)?,
        ("POST", Route::ClearLogs) => handlers::clear_logs(state)?,
        ("GET", Route::ExportLogs) => handlers::export_logs(state)?,
        _ => return Ok(None),
    };
    Ok(Some(resp))
}

/// Turn a handler error into a response, recording it in the error log.
pub fn error_response(
    state: &AppState,
    err: &DebuggerError,
    request: Option<&RequestRecord>,
) -> HttpResponse {
    let status = err.status();
    if err.is_recorded() {
        state.logs.record_error(
            err.kind(),
            &err.to_string(),
            json!({ "status": status }),
            request,
        );
    }
    if status >= 500 {
        tracing::error!(kind = err.kind(), error = %err, "request failed");
    } else {
        tracing::debug!(kind = err.kind(), error = %err, "request rejected");
    }
    HttpResponse::error(status, &err.public_message())
}

/// Route one parsed request.  Every request outside `/debug/` is appended to
/// the request log before dispatch.
pub fn route(state: &AppState, req: &HttpRequest) -> HttpResponse {
    let live = if is_introspection(&req.path) {
        None
    } else {
        Some(state.logs.record_request(req.to_record(&state.config)))
    };

    let Some(route) = resolve(&req.path) else {
        return HttpResponse::error(404, "Not found");
    };

    match dispatch(state, req, route, live.clone()) {
        Ok(Some(resp)) => resp,
        Ok(None) => HttpResponse::error(405, "Method not allowed"),
        Err(err) => error_response(state, &err, live.as_ref()),
    }
}

/// The accept loop: one task per connection, one request per connection.
pub struct Server {
    listener: TcpListener,
    state: Arc<AppState>,
}

impl Server {
    /// Bind to the configured host and port (port 0 picks a free one).
    pub async fn bind(state: Arc<AppState>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(state.config.bind_addr()).await?;
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) -> std::io::Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, state).await {
                    tracing::warn!(peer = %addr, error = %e, "connection error");
                }
            });
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    state: Arc<AppState>,
) -> std::io::Result<()> {
    let peer = Some(addr.ip().to_string());
    let response = match read_request(&mut stream, peer, state.config.max_body_bytes).await {
        Ok(Some(req)) => {
            tracing::debug!(method = %req.method, path = %req.path, "request");
            route_blocking(Arc::clone(&state), req).await
        }
        Ok(None) => return Ok(()),
        Err(DebuggerError::Io(e)) => return Err(e),
        Err(err) => error_response(&state, &err, None),
    };
    stream.write_all(&response.to_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await
}

/// Run [`route`] on the blocking pool; handlers do synchronous file I/O and
/// may wait on the mutation lock.
pub async fn route_blocking(state: Arc<AppState>, req: HttpRequest) -> HttpResponse {
    match tokio::task::spawn_blocking(move || route(&state, &req)).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::error!(error = %e, "request handler panicked");
            HttpResponse::error(500, "Internal error")
        }
    }
}

/// Bind, print the banner, and serve until the process is stopped.
pub async fn serve(state: Arc<AppState>, banner: bool) -> std::io::Result<()> {
    let server = Server::bind(Arc::clone(&state)).await?;
    let addr = server.local_addr()?;
    tracing::info!(%addr, storage = %state.store.dir().display(), "listening");

    if banner {
        eprintln!(
            "{}",
            format!("  Snapshot debugger running at http://{addr}").bright_green()
        );
        eprintln!(
            "{}",
            format!("  Snapshots stored in {}", state.store.dir().display()).bright_cyan()
        );
        eprintln!("{}", "  Press Ctrl+C to stop.".bright_blue());
    }

    server.run().await
}
