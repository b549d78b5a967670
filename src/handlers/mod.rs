pub mod advance;
pub mod employee;
pub mod ewa;
pub mod general;
pub mod payroll;
pub mod payslip;
pub mod salary;
pub mod tax;
