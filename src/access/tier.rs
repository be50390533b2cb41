use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Subscription level. Declaration order is the ranking, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Basic,
    Premium,
    Enterprise,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Free, Tier::Basic, Tier::Premium, Tier::Enterprise];

    pub fn lowest() -> Tier { Tier::Free }

    pub fn rank(self) -> u8 {
        match self {
            Tier::Free => 0,
            Tier::Basic => 1,
            Tier::Premium => 2,
            Tier::Enterprise => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Premium => "premium",
            Tier::Enterprise => "enterprise",
        }
    }

    pub fn satisfies(self, required: Tier) -> bool { self.rank() >= required.rank() }
}

impl Display for Tier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Tier {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "basic" => Ok(Tier::Basic),
            "premium" => Ok(Tier::Premium),
            "enterprise" => Ok(Tier::Enterprise),
            other => Err(format!("unknown tier '{}'", other)),
        }
    }
}

/// Plan flags a route can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Regions,
    Departments,
    Municipalities,
    Schools,
    ExportCsv,
    ExportExcel,
    ExportPdf,
    ApiAccess,
}

impl Feature {
    /// Shown in denial messages.
    pub fn label(self) -> &'static str {
        match self {
            Feature::Regions => "region-level data",
            Feature::Departments => "department-level data",
            Feature::Municipalities => "municipality-level data",
            Feature::Schools => "individual school data",
            Feature::ExportCsv => "CSV export",
            Feature::ExportExcel => "Excel export",
            Feature::ExportPdf => "PDF export",
            Feature::ApiAccess => "API access",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub tier: Tier,
    pub name: String,
    pub description: String,
    pub max_queries_per_day: u32,
    /// `None` = unlimited.
    pub max_export_rows: Option<u32>,
    pub api_access: bool,
    /// Requests per hour, `None` = unlimited.
    pub api_rate_limit: Option<u32>,
    pub access_regions: bool,
    pub access_departments: bool,
    pub access_municipalities: bool,
    pub access_schools: bool,
    pub years_of_data: u32,
    pub export_csv: bool,
    pub export_excel: bool,
    pub export_pdf: bool,
    pub is_active: bool,
}

impl Plan {
    pub fn has(&self, feature: Feature) -> bool {
        match feature {
            Feature::Regions => self.access_regions,
            Feature::Departments => self.access_departments,
            Feature::Municipalities => self.access_municipalities,
            Feature::Schools => self.access_schools,
            Feature::ExportCsv => self.export_csv,
            Feature::ExportExcel => self.export_excel,
            Feature::ExportPdf => self.export_pdf,
            Feature::ApiAccess => self.api_access,
        }
    }

    /// Used when the catalog has no free plan at all.
    pub fn fallback_free() -> Plan {
        Plan {
            tier: Tier::Free,
            name: "Free Plan".into(),
            description: "Basic access to ICFES Analytics".into(),
            max_queries_per_day: 10,
            max_export_rows: None,
            api_access: false,
            api_rate_limit: None,
            access_regions: true,
            access_departments: false,
            access_municipalities: false,
            access_schools: false,
            years_of_data: 3,
            export_csv: false,
            export_excel: false,
            export_pdf: false,
            is_active: true,
        }
    }
}

/// The plans on offer, at most one per tier.
#[derive(Debug, Clone, Default)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
}

impl PlanCatalog {
    pub fn new(mut plans: Vec<Plan>) -> Self {
        plans.sort_by_key(|p| p.tier);
        plans.dedup_by_key(|p| p.tier);
        Self { plans }
    }

    /// The four standard plans.
    pub fn seeded() -> Self {
        let base = Plan::fallback_free();
        PlanCatalog::new(vec![
            Plan {
                name: "Free".into(),
                description: "Acceso básico gratuito al dashboard nacional.".into(),
                max_queries_per_day: 20,
                ..base.clone()
            },
            Plan {
                tier: Tier::Basic,
                name: "Basic".into(),
                description: "Acceso a datos departamentales y exportación CSV.".into(),
                max_queries_per_day: 200,
                max_export_rows: Some(5000),
                access_departments: true,
                access_schools: true,
                years_of_data: 9,
                export_csv: true,
                export_pdf: true,
                ..base.clone()
            },
            Plan {
                tier: Tier::Premium,
                name: "Premium".into(),
                description: "Acceso completo a colegios, municipios, exportación Excel y API.".into(),
                max_queries_per_day: 1000,
                max_export_rows: Some(50_000),
                api_access: true,
                api_rate_limit: Some(500),
                access_departments: true,
                access_municipalities: true,
                access_schools: true,
                years_of_data: 9,
                export_csv: true,
                export_excel: true,
                export_pdf: true,
                ..base.clone()
            },
            Plan {
                tier: Tier::Enterprise,
                name: "Enterprise".into(),
                description: "Sin límites. API ilimitada. Para entidades gubernamentales e instituciones.".into(),
                max_queries_per_day: 99_999,
                api_access: true,
                access_departments: true,
                access_municipalities: true,
                access_schools: true,
                years_of_data: 9,
                export_csv: true,
                export_excel: true,
                export_pdf: true,
                ..base
            },
        ])
    }

    pub fn plans(&self) -> &[Plan] { &self.plans }

    pub fn get(&self, tier: Tier) -> Option<&Plan> { self.plans.iter().find(|p| p.tier == tier) }

    /// Plan given to new and reactivated subscriptions.
    pub fn lowest(&self) -> Plan {
        self.get(Tier::lowest()).cloned().unwrap_or_else(Plan::fallback_free)
    }

    /// Plan for a tier; a tier with no plan is treated as the lowest one.
    pub fn plan_for(&self, tier: Tier) -> Plan {
        self.get(tier).cloned().unwrap_or_else(|| self.lowest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_follows_declaration_order() {
        assert!(Tier::Enterprise.satisfies(Tier::Premium));
        assert!(Tier::Basic.satisfies(Tier::Basic));
        assert!(!Tier::Free.satisfies(Tier::Basic));
        assert_eq!("Premium".parse::<Tier>().unwrap(), Tier::Premium);
        assert!("gold".parse::<Tier>().is_err());
    }

    #[test]
    fn seeded_catalog_limits() {
        let c = PlanCatalog::seeded();
        let limits: Vec<u32> = Tier::ALL.iter().map(|t| c.plan_for(*t).max_queries_per_day).collect();
        assert_eq!(limits, vec![20, 200, 1000, 99_999]);
        assert!(c.plan_for(Tier::Basic).has(Feature::Schools));
        assert!(!c.plan_for(Tier::Basic).has(Feature::Municipalities));
    }

    #[test]
    fn missing_free_plan_uses_builtin_fallback() {
        let c = PlanCatalog::new(vec![]);
        assert_eq!(c.lowest().max_queries_per_day, 10);
        assert_eq!(c.plan_for(Tier::Premium).tier, Tier::Free);
    }
}
