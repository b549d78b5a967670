//! Statutory deduction rules: PAYE over progressive bands, NSSF and LST.
//!
//! Everything here is pure decimal arithmetic. A [`TaxRules`] value can only
//! be obtained through [`TaxRules::new`], which rejects malformed bands and
//! out-of-range rates, so the calculations themselves never fail.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool, types::Json};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    errors::{AppError, AppResult},
    models::{SetTaxConfigRequest, StatutoryPreview, TaxBracket, TaxConfig},
    money::{MONEY_SCALE, check_scale, round_money},
    services::{
        employee,
        propagation::{EventSender, PayrollEvent},
    },
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaxBand {
    pub lower: Decimal,
    /// `None` for the open-ended top band
    pub upper: Option<Decimal>,
    /// Marginal rate as a fraction, e.g. 0.30
    pub rate: Decimal,
}

impl TaxBand {
    fn contains(&self, gross: Decimal) -> bool {
        gross > self.lower && self.upper.is_none_or(|upper| gross <= upper)
    }
}

/// Rates are stored as NUMERIC(7, 4).
pub const RATE_SCALE: u32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTaxRules")]
pub struct TaxRules {
    bands: Vec<TaxBand>,
    nssf_employee_rate: Decimal,
    nssf_employer_rate: Decimal,
    nssf_ceiling: Decimal,
    lst_enabled: bool,
    lst_rate: Decimal,
}

/// Wire shape of [`TaxRules`]; deserialization goes through [`TaxRules::new`].
#[derive(Deserialize)]
struct RawTaxRules {
    bands: Vec<TaxBand>,
    nssf_employee_rate: Decimal,
    nssf_employer_rate: Decimal,
    nssf_ceiling: Decimal,
    lst_enabled: bool,
    lst_rate: Decimal,
}

impl TryFrom<RawTaxRules> for TaxRules {
    type Error = AppError;

    fn try_from(raw: RawTaxRules) -> Result<Self, Self::Error> {
        TaxRules::new(
            raw.bands,
            raw.nssf_employee_rate,
            raw.nssf_employer_rate,
            raw.nssf_ceiling,
            raw.lst_enabled,
            raw.lst_rate,
        )
    }
}

fn check_rate(name: &str, rate: Decimal) -> AppResult<()> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(AppError::Config(format!(
            "{} must be between 0 and 1, got {}",
            name, rate
        )));
    }
    if rate.normalize().scale() > RATE_SCALE {
        return Err(AppError::Config(format!(
            "{} allows at most {} decimal places, got {}",
            name, RATE_SCALE, rate
        )));
    }
    Ok(())
}

impl TaxRules {
    pub fn new(
        bands: Vec<TaxBand>,
        nssf_employee_rate: Decimal,
        nssf_employer_rate: Decimal,
        nssf_ceiling: Decimal,
        lst_enabled: bool,
        lst_rate: Decimal,
    ) -> AppResult<Self> {
        if bands.is_empty() {
            return Err(AppError::Config("at least one PAYE band is required".into()));
        }
        if bands[0].lower < Decimal::ZERO {
            return Err(AppError::Config("PAYE bands cannot start below zero".into()));
        }
        for (i, band) in bands.iter().enumerate() {
            check_rate("PAYE band rate", band.rate)?;
            let is_last = i + 1 == bands.len();
            match (band.upper, is_last) {
                (Some(upper), _) if upper <= band.lower => {
                    return Err(AppError::Config(format!(
                        "band {} has upper {} not above lower {}",
                        i + 1,
                        upper,
                        band.lower
                    )));
                }
                (None, false) => {
                    return Err(AppError::Config(
                        "only the last PAYE band may be open-ended".into(),
                    ));
                }
                _ => {}
            }
            if let Some(next) = bands.get(i + 1) {
                if band.upper != Some(next.lower) {
                    return Err(AppError::Config(format!(
                        "PAYE bands {} and {} are not contiguous",
                        i + 1,
                        i + 2
                    )));
                }
            }
        }
        check_rate("NSSF employee rate", nssf_employee_rate)?;
        check_rate("NSSF employer rate", nssf_employer_rate)?;
        check_rate("LST rate", lst_rate)?;
        if nssf_ceiling < Decimal::ZERO {
            return Err(AppError::Config("NSSF ceiling cannot be negative".into()));
        }

        Ok(Self {
            bands,
            nssf_employee_rate,
            nssf_employer_rate,
            nssf_ceiling,
            lst_enabled,
            lst_rate,
        })
    }

    /// Uganda preset: 0–235k @0, 235k–335k @10%, 335k–410k @20%,
    /// 410k–10M @30%, above 10M @40%; NSSF 5%/10% uncapped; LST off.
    pub fn uganda() -> Self {
        let band = |lower, upper, rate| TaxBand { lower, upper, rate };
        Self {
            bands: vec![
                band(dec!(0), Some(dec!(235000)), dec!(0)),
                band(dec!(235000), Some(dec!(335000)), dec!(0.10)),
                band(dec!(335000), Some(dec!(410000)), dec!(0.20)),
                band(dec!(410000), Some(dec!(10000000)), dec!(0.30)),
                band(dec!(10000000), None, dec!(0.40)),
            ],
            nssf_employee_rate: dec!(0.05),
            nssf_employer_rate: dec!(0.10),
            nssf_ceiling: Decimal::ZERO,
            lst_enabled: false,
            lst_rate: Decimal::ZERO,
        }
    }

    pub fn bands(&self) -> &[TaxBand] {
        &self.bands
    }

    pub fn paye(&self, gross: Decimal) -> Decimal {
        let total: Decimal = self
            .bands
            .iter()
            .filter(|band| gross > band.lower)
            .map(|band| {
                let top = band.upper.map_or(gross, |upper| gross.min(upper));
                (top - band.lower) * band.rate
            })
            .sum();
        round_money(total)
    }

    pub fn nssf_employee(&self, gross: Decimal) -> Decimal {
        self.capped_contribution(gross, self.nssf_employee_rate)
    }

    pub fn nssf_employer(&self, gross: Decimal) -> Decimal {
        self.capped_contribution(gross, self.nssf_employer_rate)
    }

    fn capped_contribution(&self, gross: Decimal, rate: Decimal) -> Decimal {
        let amount = gross * rate;
        if self.nssf_ceiling > Decimal::ZERO {
            round_money(amount.min(self.nssf_ceiling))
        } else {
            round_money(amount)
        }
    }

    pub fn lst(&self, gross: Decimal) -> Decimal {
        if self.lst_enabled {
            round_money(gross * self.lst_rate)
        } else {
            Decimal::ZERO
        }
    }

    /// The band `gross` falls in, with `amount` computed by [`Self::paye`].
    pub fn bracket_of(&self, gross: Decimal) -> TaxBracket {
        let index = self
            .bands
            .iter()
            .position(|band| band.contains(gross))
            .unwrap_or(0);
        let band = &self.bands[index];
        TaxBracket {
            label: format!("Band {}", index + 1),
            lower: band.lower,
            upper: band.upper,
            rate: band.rate,
            amount: self.paye(gross),
        }
    }
}

// ─── Persistence ──────────────────────────────────────────────────────────────

/// The rules a payslip is built with, plus where they came from.
#[derive(Debug, Clone)]
pub struct TaxSnapshot {
    /// `None` when the built-in preset is in use
    pub config_id: Option<Uuid>,
    pub currency: Option<String>,
    pub rules: TaxRules,
}

pub async fn current_config<'e, E: PgExecutor<'e>>(
    executor: E,
    tenant_id: Uuid,
) -> AppResult<Option<TaxConfig>> {
    let row = sqlx::query_as::<_, TaxConfig>(
        "SELECT * FROM tax_configs WHERE tenant_id = $1 AND is_current",
    )
    .bind(tenant_id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

/// Current validated rules for a tenant. Tenants that never configured tax
/// fall back to the Uganda preset.
pub async fn current_snapshot<'e, E: PgExecutor<'e>>(
    executor: E,
    tenant_id: Uuid,
) -> AppResult<TaxSnapshot> {
    match current_config(executor, tenant_id).await? {
        Some(config) => Ok(TaxSnapshot {
            config_id: Some(config.id),
            currency: Some(config.currency.clone()),
            rules: config.rules()?,
        }),
        None => {
            warn!(%tenant_id, "no tax settings configured, using the built-in Uganda preset");
            Ok(TaxSnapshot {
                config_id: None,
                currency: None,
                rules: TaxRules::uganda(),
            })
        }
    }
}

/// Settings apply from the day they are saved, so a future start date is refused.
fn resolve_effective_from(requested: Option<NaiveDate>, today: NaiveDate) -> AppResult<NaiveDate> {
    match requested {
        Some(date) if date > today => Err(AppError::Validation(format!(
            "effective_from {} is in the future; save the settings on or after that date",
            date
        ))),
        Some(date) => Ok(date),
        None => Ok(today),
    }
}

/// Replaces the tenant's current tax settings and schedules tenant-wide
/// propagation once the write has committed.
pub async fn set_config(
    db: &PgPool,
    events: &EventSender,
    tenant_id: Uuid,
    tenant_name: &str,
    body: SetTaxConfigRequest,
) -> AppResult<TaxConfig> {
    if body.currency.len() != 3 || !body.currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(AppError::Validation("currency must be an ISO-4217 code".into()));
    }
    // Rejects malformed bands and rates before anything is written
    TaxRules::new(
        body.paye_bands.clone(),
        body.nssf_employee_rate,
        body.nssf_employer_rate,
        body.nssf_ceiling,
        body.lst_enabled,
        body.lst_rate,
    )?;
    let reliefs = [body.personal_relief, body.insurance_relief, body.pension_relief];
    if reliefs.iter().any(|r| *r < Decimal::ZERO) {
        return Err(AppError::Config("reliefs cannot be negative".into()));
    }
    check_scale("nssf_ceiling", body.nssf_ceiling, MONEY_SCALE)?;
    for (name, relief) in ["personal_relief", "insurance_relief", "pension_relief"]
        .into_iter()
        .zip(reliefs)
    {
        check_scale(name, relief, MONEY_SCALE)?;
    }
    let effective_from = resolve_effective_from(body.effective_from, Utc::now().date_naive())?;

    let mut tx = db.begin().await?;
    employee::register_tenant(&mut tx, tenant_id, tenant_name).await?;

    sqlx::query("SELECT id FROM tax_configs WHERE tenant_id = $1 AND is_current FOR UPDATE")
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?;
    sqlx::query("UPDATE tax_configs SET is_current = false WHERE tenant_id = $1 AND is_current")
        .bind(tenant_id)
        .execute(&mut *tx)
        .await?;

    let config = sqlx::query_as::<_, TaxConfig>(
        r#"INSERT INTO tax_configs (
            id, tenant_id, jurisdiction, currency, tax_year, paye_bands,
            personal_relief, insurance_relief, pension_relief,
            nssf_employee_rate, nssf_employer_rate, nssf_ceiling,
            lst_enabled, lst_rate, effective_from, is_current, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,true,NOW())
        RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(&body.jurisdiction)
    .bind(&body.currency)
    .bind(body.tax_year)
    .bind(Json(&body.paye_bands))
    .bind(body.personal_relief)
    .bind(body.insurance_relief)
    .bind(body.pension_relief)
    .bind(body.nssf_employee_rate)
    .bind(body.nssf_employer_rate)
    .bind(body.nssf_ceiling)
    .bind(body.lst_enabled)
    .bind(body.lst_rate)
    .bind(effective_from)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(%tenant_id, jurisdiction = %config.jurisdiction, tax_year = config.tax_year, "tax settings replaced");

    events.publish(PayrollEvent::TaxConfigChanged { tenant_id }).await;
    Ok(config)
}

/// Statutory breakdown of `gross` under the tenant's current rules.
pub async fn preview(
    db: &PgPool,
    tenant_id: Uuid,
    gross: Decimal,
    default_currency: &str,
) -> AppResult<StatutoryPreview> {
    if gross < Decimal::ZERO {
        return Err(AppError::Validation("gross cannot be negative".into()));
    }
    let snapshot = current_snapshot(db, tenant_id).await?;
    let rules = &snapshot.rules;
    Ok(StatutoryPreview {
        gross,
        bracket: rules.bracket_of(gross),
        paye: rules.paye(gross),
        nssf_employee: rules.nssf_employee(gross),
        nssf_employer: rules.nssf_employer(gross),
        lst: rules.lst(gross),
        currency: snapshot
            .currency
            .unwrap_or_else(|| default_currency.to_string()),
        is_default: snapshot.config_id.is_none(),
    })
}

pub async fn history(db: &PgPool, tenant_id: Uuid) -> AppResult<Vec<TaxConfig>> {
    let rows = sqlx::query_as::<_, TaxConfig>(
        "SELECT * FROM tax_configs WHERE tenant_id = $1 ORDER BY created_at DESC",
    )
    .bind(tenant_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ug() -> TaxRules {
        TaxRules::uganda()
    }

    #[test]
    fn test_paye_below_threshold_is_zero() {
        assert_eq!(ug().paye(dec!(200000)), dec!(0));
        assert_eq!(ug().paye(dec!(235000)), dec!(0));
        assert_eq!(ug().paye(dec!(0)), dec!(0));
    }

    #[test]
    fn test_uganda_scenarios() {
        let rules = ug();
        assert_eq!(rules.nssf_employee(dec!(200000)), dec!(10000));
        assert_eq!(rules.paye(dec!(300000)), dec!(6500));
        assert_eq!(rules.paye(dec!(400000)), dec!(23000));
        assert_eq!(rules.paye(dec!(1000000)), dec!(202000));
        assert_eq!(rules.nssf_employee(dec!(1000000)), dec!(50000));
        assert_eq!(rules.paye(dec!(12000000)), dec!(3702000));
    }

    #[test]
    fn test_paye_at_band_boundaries() {
        let rules = ug();
        assert_eq!(rules.paye(dec!(335000)), dec!(10000));
        assert_eq!(rules.paye(dec!(410000)), dec!(25000));
        assert_eq!(rules.paye(dec!(10000000)), dec!(2902000));
        // One unit above a boundary adds exactly the next band's marginal rate
        assert_eq!(rules.paye(dec!(335001)), dec!(10000.20));
        assert_eq!(rules.paye(dec!(410001)), dec!(25000.30));
    }

    #[test]
    fn test_paye_matches_manual_integration() {
        let rules = ug();
        for gross in [dec!(1), dec!(250000.55), dec!(777777.77), dec!(15000000)] {
            let mut manual = Decimal::ZERO;
            for band in rules.bands() {
                if gross > band.lower {
                    let top = match band.upper {
                        Some(u) if u < gross => u,
                        _ => gross,
                    };
                    manual += (top - band.lower) * band.rate;
                }
            }
            assert_eq!(rules.paye(gross), round_money(manual));
        }
    }

    #[test]
    fn test_nssf_ceiling_saturates() {
        let capped = TaxRules::new(
            ug().bands().to_vec(),
            dec!(0.05),
            dec!(0.10),
            dec!(20000),
            false,
            dec!(0),
        )
        .unwrap();
        assert_eq!(capped.nssf_employee(dec!(300000)), dec!(15000));
        assert_eq!(capped.nssf_employee(dec!(1000000)), dec!(20000));
        assert_eq!(capped.nssf_employer(dec!(1000000)), dec!(20000));
        assert_eq!(ug().nssf_employer(dec!(1000000)), dec!(100000));
    }

    #[test]
    fn test_lst_only_when_enabled() {
        assert_eq!(ug().lst(dec!(1000000)), dec!(0));
        let with_lst =
            TaxRules::new(ug().bands().to_vec(), dec!(0.05), dec!(0.1), dec!(0), true, dec!(0.01))
                .unwrap();
        assert_eq!(with_lst.lst(dec!(1000000)), dec!(10000));
    }

    #[test]
    fn test_bracket_agrees_with_paye() {
        let rules = ug();
        let bracket = rules.bracket_of(dec!(400000));
        assert_eq!(bracket.label, "Band 3");
        assert_eq!(bracket.rate, dec!(0.20));
        assert_eq!(bracket.amount, rules.paye(dec!(400000)));

        assert_eq!(rules.bracket_of(dec!(0)).label, "Band 1");
        assert_eq!(rules.bracket_of(dec!(335000)).label, "Band 2");
        assert_eq!(rules.bracket_of(dec!(50000000)).upper, None);
    }

    #[test]
    fn test_invalid_configs_fail_construction() {
        let band = |lower, upper, rate| TaxBand { lower, upper, rate };
        let overlapping = vec![
            band(dec!(0), Some(dec!(100)), dec!(0)),
            band(dec!(50), None, dec!(0.1)),
        ];
        assert!(matches!(
            TaxRules::new(overlapping, dec!(0.05), dec!(0.1), dec!(0), false, dec!(0)),
            Err(AppError::Config(_))
        ));

        let negative = vec![band(dec!(0), None, dec!(-0.1))];
        assert!(TaxRules::new(negative, dec!(0.05), dec!(0.1), dec!(0), false, dec!(0)).is_err());

        let open_middle = vec![band(dec!(0), None, dec!(0)), band(dec!(10), None, dec!(0.1))];
        assert!(TaxRules::new(open_middle, dec!(0.05), dec!(0.1), dec!(0), false, dec!(0)).is_err());

        assert!(TaxRules::new(vec![], dec!(0.05), dec!(0.1), dec!(0), false, dec!(0)).is_err());
        assert!(
            TaxRules::new(ug().bands().to_vec(), dec!(1.5), dec!(0.1), dec!(0), false, dec!(0))
                .is_err()
        );
    }

    #[test]
    fn test_rates_limited_to_four_decimal_places() {
        let bands = ug().bands().to_vec();
        assert!(matches!(
            TaxRules::new(bands.clone(), dec!(0.05), dec!(0.1), dec!(0), true, dec!(0.00005)),
            Err(AppError::Config(_))
        ));
        assert!(TaxRules::new(bands.clone(), dec!(0.05), dec!(0.1), dec!(0), true, dec!(0.005)).is_ok());
        // Trailing zeros are not extra precision
        assert!(TaxRules::new(bands, dec!(0.050000), dec!(0.1), dec!(0), true, dec!(0)).is_ok());
    }

    #[test]
    fn test_deserialization_validates_rules() {
        let stored = serde_json::to_value(ug()).unwrap();
        let back: TaxRules = serde_json::from_value(stored.clone()).unwrap();
        assert_eq!(back, ug());

        let mut bad_rate = stored.clone();
        bad_rate["nssf_employee_rate"] = serde_json::json!("1.5");
        assert!(serde_json::from_value::<TaxRules>(bad_rate).is_err());

        let mut no_bands = stored;
        no_bands["bands"] = serde_json::json!([]);
        assert!(serde_json::from_value::<TaxRules>(no_bands).is_err());
    }

    #[test]
    fn test_future_effective_date_rejected() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let tomorrow = today.succ_opt().unwrap();
        let last_year = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();

        assert!(matches!(
            resolve_effective_from(Some(tomorrow), today),
            Err(AppError::Validation(_))
        ));
        assert_eq!(resolve_effective_from(Some(today), today).unwrap(), today);
        assert_eq!(resolve_effective_from(Some(last_year), today).unwrap(), last_year);
        assert_eq!(resolve_effective_from(None, today).unwrap(), today);
    }
}
