use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
};
use serde_json::json;

/// Root handler, an HTML landing page with links to the docs and main routes
pub async fn root_handler() -> impl IntoResponse {
    Html(r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0"/>
  <title>HRMS Payroll API</title>
  <style>
    * { box-sizing: border-box; margin: 0; padding: 0; }
    body { font-family: 'Segoe UI', system-ui, sans-serif; background: #0f172a; color: #e2e8f0; min-height: 100vh; padding: 40px 20px; }
    .container { max-width: 860px; margin: 0 auto; }
    header { text-align: center; margin-bottom: 48px; }
    header h1 { font-size: 2.8rem; font-weight: 800; background: linear-gradient(135deg, #3b82f6, #8b5cf6); -webkit-background-clip: text; -webkit-text-fill-color: transparent; margin-bottom: 8px; }
    header p { color: #94a3b8; font-size: 1.1rem; }
    .badge { display: inline-block; background: #1e293b; border: 1px solid #334155; color: #38bdf8; padding: 4px 12px; border-radius: 20px; font-size: 0.8rem; margin-top: 12px; }
    .grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(260px, 1fr)); gap: 16px; margin-bottom: 32px; }
    .card { background: #1e293b; border: 1px solid #334155; border-radius: 12px; padding: 20px; transition: border-color 0.2s; }
    .card:hover { border-color: #3b82f6; }
    .card h3 { font-size: 1rem; font-weight: 600; color: #f1f5f9; margin-bottom: 6px; display: flex; align-items: center; gap: 8px; }
    .card p { font-size: 0.875rem; color: #94a3b8; line-height: 1.5; }
    .card a { color: #38bdf8; text-decoration: none; font-weight: 500; display: inline-block; margin-top: 8px; font-size: 0.875rem; }
    .card a:hover { text-decoration: underline; }
    .routes { background: #1e293b; border: 1px solid #334155; border-radius: 12px; padding: 24px; }
    .routes h2 { font-size: 1.2rem; font-weight: 700; color: #f1f5f9; margin-bottom: 16px; }
    .route-group { margin-bottom: 20px; }
    .route-group h4 { font-size: 0.8rem; font-weight: 600; text-transform: uppercase; letter-spacing: 0.1em; color: #64748b; margin-bottom: 8px; }
    .route-item { display: flex; align-items: flex-start; gap: 12px; padding: 8px 0; border-bottom: 1px solid #0f172a; }
    .route-item:last-child { border-bottom: none; }
    .method { font-size: 0.7rem; font-weight: 700; padding: 2px 8px; border-radius: 4px; min-width: 52px; text-align: center; font-family: monospace; }
    .get { background: #064e3b; color: #34d399; }
    .post { background: #1e3a5f; color: #60a5fa; }
    .put, .patch { background: #451a03; color: #fb923c; }
    .delete { background: #4c0519; color: #fb7185; }
    .route-path { font-family: monospace; font-size: 0.85rem; color: #e2e8f0; flex: 1; }
    .route-desc { font-size: 0.8rem; color: #64748b; }
    footer { text-align: center; margin-top: 40px; color: #475569; font-size: 0.85rem; }
  </style>
</head>
<body>
<div class="container">
  <header>
    <h1>HRMS Payroll API</h1>
    <p>Multi-tenant payroll core: statutory tax, payslips, payroll runs, advances and earned wage access</p>
    <span class="badge">v1.0.0 · REST API · JSON</span>
  </header>

  <div class="grid">
    <div class="card">
      <h3>API Documentation</h3>
      <p>Interactive Swagger UI with request and response schemas for every endpoint.</p>
      <a href="/docs">Open Swagger UI →</a>
    </div>
    <div class="card">
      <h3>Health Check</h3>
      <p>Confirm the service is running and the database is reachable.</p>
      <a href="/health">GET /health →</a>
    </div>
    <div class="card">
      <h3>Live Recalculation</h3>
      <p>Salary structure and tax setting changes flow into every draft or processing run automatically.</p>
    </div>
  </div>

  <div class="routes">
    <h2>API Routes</h2>

    <div class="route-group">
      <h4>Employees &amp; Salary</h4>
      <div class="route-item"><span class="method post">POST</span><span class="route-path">/api/v1/employees/</span><span class="route-desc">Onboard an employee</span></div>
      <div class="route-item"><span class="method get">GET</span><span class="route-path">/api/v1/employees/</span><span class="route-desc">List employees</span></div>
      <div class="route-item"><span class="method patch">PATCH</span><span class="route-path">/api/v1/employees/{id}/status/</span><span class="route-desc">Change employment status</span></div>
      <div class="route-item"><span class="method post">POST</span><span class="route-path">/api/v1/salary-structures/</span><span class="route-desc">Create or replace a salary structure</span></div>
      <div class="route-item"><span class="method get">GET</span><span class="route-path">/api/v1/salary-structures/current/{employee_id}/</span><span class="route-desc">Structure in effect today</span></div>
    </div>

    <div class="route-group">
      <h4>Tax Settings</h4>
      <div class="route-item"><span class="method put">PUT</span><span class="route-path">/api/v1/tax-settings/</span><span class="route-desc">Replace PAYE bands, NSSF and LST</span></div>
      <div class="route-item"><span class="method get">GET</span><span class="route-path">/api/v1/tax-settings/bracket/?gross=</span><span class="route-desc">Statutory breakdown for a gross amount</span></div>
    </div>

    <div class="route-group">
      <h4>Payroll</h4>
      <div class="route-item"><span class="method post">POST</span><span class="route-path">/api/v1/payroll-runs/</span><span class="route-desc">Create a draft run</span></div>
      <div class="route-item"><span class="method post">POST</span><span class="route-path">/api/v1/payroll-runs/{id}/process_payroll/</span><span class="route-desc">Build payslips</span></div>
      <div class="route-item"><span class="method post">POST</span><span class="route-path">/api/v1/payroll-runs/{id}/approve_payroll/</span><span class="route-desc">Approve a processed run</span></div>
      <div class="route-item"><span class="method post">POST</span><span class="route-path">/api/v1/payroll-runs/{id}/mark_paid/</span><span class="route-desc">Mark paid and record repayments</span></div>
      <div class="route-item"><span class="method patch">PATCH</span><span class="route-path">/api/v1/payslips/{id}/</span><span class="route-desc">Edit bonus or deductions</span></div>
    </div>

    <div class="route-group">
      <h4>Advances &amp; EWA</h4>
      <div class="route-item"><span class="method post">POST</span><span class="route-path">/api/v1/salary-advances/</span><span class="route-desc">Request a loan or salary advance</span></div>
      <div class="route-item"><span class="method get">GET</span><span class="route-path">/api/v1/ewa-requests/check_eligibility/</span><span class="route-desc">Check earned wage access eligibility</span></div>
      <div class="route-item"><span class="method post">POST</span><span class="route-path">/api/v1/ewa-requests/</span><span class="route-desc">Request earned wages</span></div>
    </div>
  </div>

  <footer>
    <p>Built with Rust · Axum · SQLx · rust_decimal</p>
  </footer>
</div>
</body>
</html>"#)
}

/// Health check endpoint
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected",
                "service": "hrms-payroll",
                "version": "1.0.0"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "database": "disconnected",
                "error": e.to_string()
            })),
        ),
    }
}