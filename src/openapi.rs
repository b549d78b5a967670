// src/openapi.rs

use crate::{
    models::{
        AdvanceDetail, AdvanceRepayment, AdvanceStatus, AdvanceType, BuildReport,
        CreateAdvanceRequest, CreateEmployeeRequest, CreateEwaRequest, CreatePayrollRunRequest,
        DisburseEwaRequest, EarnedToDate, EligibilityFailure, EligibilityReport, Employee,
        EmploymentStatus, EwaConfig, EwaRequest, EwaStatus, PaymentStatus, PayrollRun, Payslip,
        RejectEwaRequest, RunStatus, SalaryAdvance, SalaryComponents, SalaryStructure,
        ScheduleEntry, SetEwaConfigRequest, SetTaxConfigRequest, SkippedEmployee,
        StatutoryPreview, TaxBracket, TaxConfig, UpdateEmploymentStatusRequest,
        UpdatePayslipRequest, UpsertSalaryStructureRequest,
    },
    services::tax::TaxBand,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRMS Payroll API",
        version = "1.0.0",
        description = "Multi-tenant payroll core built with Rust and Axum. \
            Computes PAYE, NSSF and LST from per-tenant tax settings, builds payslips \
            for monthly payroll runs, keeps open runs in step with salary and tax changes, \
            and manages loans, salary advances and earned wage access.",
        license(name = "MIT")
    ),
    paths(
        // Employees
        crate::handlers::employee::create_employee,
        crate::handlers::employee::list_employees,
        crate::handlers::employee::get_employee,
        crate::handlers::employee::update_employment_status,
        // Salary structures
        crate::handlers::salary::upsert_structure,
        crate::handlers::salary::list_structures,
        crate::handlers::salary::current_structure,
        // Tax settings
        crate::handlers::tax::set_tax_settings,
        crate::handlers::tax::get_tax_settings,
        crate::handlers::tax::tax_settings_history,
        crate::handlers::tax::tax_bracket,
        // Payroll runs
        crate::handlers::payroll::create_payroll_run,
        crate::handlers::payroll::list_payroll_runs,
        crate::handlers::payroll::get_payroll_run,
        crate::handlers::payroll::list_run_payslips,
        crate::handlers::payroll::process_payroll,
        crate::handlers::payroll::approve_payroll,
        crate::handlers::payroll::mark_paid,
        crate::handlers::payroll::cancel_payroll,
        crate::handlers::payroll::recalculate_payroll,
        crate::handlers::payroll::reconcile_ledger,
        // Payslips
        crate::handlers::payslip::get_payslip,
        crate::handlers::payslip::update_payslip,
        crate::handlers::payslip::delete_payslip,
        crate::handlers::payslip::mark_payslip_failed,
        // Advances
        crate::handlers::advance::create_advance,
        crate::handlers::advance::list_advances,
        crate::handlers::advance::get_advance,
        crate::handlers::advance::advance_schedule,
        crate::handlers::advance::approve_advance,
        crate::handlers::advance::disburse_advance,
        crate::handlers::advance::cancel_advance,
        crate::handlers::advance::default_advance,
        // Earned wage access
        crate::handlers::ewa::get_ewa_config,
        crate::handlers::ewa::set_ewa_config,
        crate::handlers::ewa::check_eligibility,
        crate::handlers::ewa::create_ewa_request,
        crate::handlers::ewa::list_ewa_requests,
        crate::handlers::ewa::get_ewa_request,
        crate::handlers::ewa::approve_ewa_request,
        crate::handlers::ewa::reject_ewa_request,
        crate::handlers::ewa::disburse_ewa_request,
    ),
    components(
        schemas(
            Employee, EmploymentStatus, CreateEmployeeRequest, UpdateEmploymentStatusRequest,
            SalaryComponents, SalaryStructure, UpsertSalaryStructureRequest,
            TaxBand, TaxConfig, SetTaxConfigRequest, TaxBracket, StatutoryPreview,
            PayrollRun, RunStatus, CreatePayrollRunRequest, BuildReport, SkippedEmployee,
            Payslip, PaymentStatus, UpdatePayslipRequest,
            SalaryAdvance, AdvanceType, AdvanceStatus, AdvanceRepayment, AdvanceDetail,
            CreateAdvanceRequest, ScheduleEntry,
            EwaConfig, SetEwaConfigRequest, EwaRequest, EwaStatus, CreateEwaRequest,
            RejectEwaRequest, DisburseEwaRequest, EligibilityReport, EligibilityFailure,
            EarnedToDate,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Employees", description = "Onboard employees and track employment status"),
        (name = "Salary Structures", description = "Effective-dated pay components"),
        (name = "Tax Settings", description = "PAYE bands, NSSF and LST per tenant"),
        (name = "Payroll", description = "Create, build, approve and pay monthly runs"),
        (name = "Payslips", description = "Inspect and adjust individual payslips"),
        (name = "Advances", description = "Loans and salary advances repaid through payroll"),
        (name = "Earned Wage Access", description = "Early access to wages already earned"),
    )
)]
pub struct ApiDoc;
