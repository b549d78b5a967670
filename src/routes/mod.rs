// src/routes/mod.rs

use crate::{
    handlers::{
        advance::{
            advance_schedule, approve_advance, cancel_advance, create_advance, default_advance,
            disburse_advance, get_advance, list_advances,
        },
        employee::{create_employee, get_employee, list_employees, update_employment_status},
        ewa::{
            approve_ewa_request, check_eligibility, create_ewa_request, disburse_ewa_request,
            get_ewa_config, get_ewa_request, list_ewa_requests, reject_ewa_request,
            set_ewa_config,
        },
        payroll::{
            approve_payroll, cancel_payroll, create_payroll_run, get_payroll_run,
            list_payroll_runs, list_run_payslips, mark_paid, process_payroll, recalculate_payroll,
            reconcile_ledger,
        },
        payslip::{delete_payslip, get_payslip, mark_payslip_failed, update_payslip},
        salary::{current_structure, list_structures, upsert_structure},
        tax::{get_tax_settings, set_tax_settings, tax_bracket, tax_settings_history},
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, patch, post},
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // ─── Employees ────────────────────────────────────────
        .route("/employees/", post(create_employee).get(list_employees))
        .route("/employees/{employee_id}/", get(get_employee))
        .route(
            "/employees/{employee_id}/status/",
            patch(update_employment_status),
        )
        // ─── Salary Structures ────────────────────────────────
        .route(
            "/salary-structures/",
            post(upsert_structure)
                .put(upsert_structure)
                .get(list_structures),
        )
        .route(
            "/salary-structures/current/{employee_id}/",
            get(current_structure),
        )
        // ─── Tax Settings ─────────────────────────────────────
        .route(
            "/tax-settings/",
            post(set_tax_settings)
                .put(set_tax_settings)
                .get(get_tax_settings),
        )
        .route("/tax-settings/history/", get(tax_settings_history))
        .route("/tax-settings/bracket/", get(tax_bracket))
        // ─── Payroll Runs ─────────────────────────────────────
        .route(
            "/payroll-runs/",
            post(create_payroll_run).get(list_payroll_runs),
        )
        .route("/payroll-runs/{run_id}/", get(get_payroll_run))
        .route("/payroll-runs/{run_id}/payslips/", get(list_run_payslips))
        .route(
            "/payroll-runs/{run_id}/process_payroll/",
            post(process_payroll),
        )
        .route(
            "/payroll-runs/{run_id}/approve_payroll/",
            post(approve_payroll),
        )
        .route("/payroll-runs/{run_id}/mark_paid/", post(mark_paid))
        .route("/payroll-runs/{run_id}/cancel/", post(cancel_payroll))
        .route(
            "/payroll-runs/{run_id}/recalculate/",
            post(recalculate_payroll),
        )
        .route(
            "/payroll-runs/{run_id}/reconcile_ledger/",
            post(reconcile_ledger),
        )
        // ─── Payslips ─────────────────────────────────────────
        .route(
            "/payslips/{payslip_id}/",
            get(get_payslip)
                .patch(update_payslip)
                .delete(delete_payslip),
        )
        .route(
            "/payslips/{payslip_id}/mark_failed/",
            post(mark_payslip_failed),
        )
        // ─── Advances ─────────────────────────────────────────
        .route("/salary-advances/", post(create_advance).get(list_advances))
        .route("/salary-advances/{advance_id}/", get(get_advance))
        .route("/salary-advances/{advance_id}/schedule/", get(advance_schedule))
        .route("/salary-advances/{advance_id}/approve/", post(approve_advance))
        .route("/salary-advances/{advance_id}/disburse/", post(disburse_advance))
        .route("/salary-advances/{advance_id}/cancel/", post(cancel_advance))
        .route("/salary-advances/{advance_id}/default/", post(default_advance))
        // ─── Earned Wage Access ───────────────────────────────
        .route("/ewa-config/", get(get_ewa_config).put(set_ewa_config))
        .route("/ewa-requests/check_eligibility/", get(check_eligibility))
        .route(
            "/ewa-requests/",
            post(create_ewa_request).get(list_ewa_requests),
        )
        .route("/ewa-requests/{request_id}/", get(get_ewa_request))
        .route(
            "/ewa-requests/{request_id}/approve/",
            post(approve_ewa_request),
        )
        .route(
            "/ewa-requests/{request_id}/reject/",
            post(reject_ewa_request),
        )
        .route(
            "/ewa-requests/{request_id}/disburse/",
            post(disburse_ewa_request),
        )
}
