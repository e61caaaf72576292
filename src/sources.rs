//! Built-in bulletin source profiles.
//!
//! Every source runs through the same pipeline; what differs is captured in
//! a [`SourceProfile`]: how its listing is parsed, what it publishes, which
//! headings open a provision, which keywords decide relevance, how titles
//! are derived and which fields identify a provision for dedup.
//!
//! | Source | Region | Kind | Relevance | Identity |
//! |--------|--------|------|-----------|----------|
//! | `boe`   | Estatal | structured JSON | item title | URL |
//! | `boja`  | Andalucía | PDF via feed | provision body | URL + title |
//! | `boa`   | Aragón | PDF via feed | provision body | URL + title |
//! | `bocyl` | Castilla y León | PDF via feed | provision body | URL + title |
//! | `docm`  | Castilla-La Mancha | PDF via feed | provision body | URL + title |
//! | `doe`   | Extremadura | PDF via feed | provision body | URL + title |

use anyhow::Result;

use crate::config::Config;
use crate::models::{DocumentKind, SourceTag};

/// How a listing body is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFormat {
    /// RSS 2.0, Atom or RDF.
    Feed,
    /// Any JSON listing.
    Json,
}

/// How a provision's title is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleRule {
    /// Leading text of the provision body.
    LeadingText,
    /// Title supplied by the listing item.
    ItemTitle,
}

/// Which fields make up the dedup identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKeyRule {
    Url,
    UrlAndTitle,
}

/// Relevance rule applied to each candidate.
#[derive(Debug, Clone)]
pub enum RelevanceRule {
    /// Stem lists matched against the provision body.
    Body {
        inclusion_stems: Vec<String>,
        exclusion_stems: Vec<String>,
    },
    /// Regex patterns matched against the item title only.
    Title {
        department_pattern: String,
        interest_pattern: String,
        exclusion_pattern: String,
    },
}

/// Complete per-source configuration value for one pipeline.
#[derive(Debug, Clone)]
pub struct SourceProfile {
    pub tag: SourceTag,
    pub name: &'static str,
    pub region: &'static str,
    pub document_kind: DocumentKind,
    pub listing_format: ListingFormat,
    pub listing_url: Option<String>,
    pub token: Option<String>,
    pub date_format: String,
    pub heading_patterns: Vec<String>,
    pub relevance: RelevanceRule,
    pub title_rule: TitleRule,
    pub identity_key: IdentityKeyRule,
}

impl SourceProfile {
    /// Built-in profile with config and environment settings applied.
    pub fn from_config(config: &Config, tag: SourceTag) -> Self {
        let mut profile = builtin_profile(tag);
        if let Some(source) = config.source(tag) {
            profile.listing_url = source.listing_url.clone();
            profile.token = source.token.clone();
            if let Some(fmt) = &source.date_format {
                profile.date_format = fmt.clone();
            }
            if let RelevanceRule::Body {
                inclusion_stems,
                exclusion_stems,
            } = &mut profile.relevance
            {
                if let Some(stems) = &source.inclusion_stems {
                    *inclusion_stems = stems.clone();
                }
                if let Some(stems) = &source.exclusion_stems {
                    *exclusion_stems = stems.clone();
                }
            }
        }
        profile
    }
}

/// Stems (lowercase, no diacritics) that mark a provision as rural/agrarian.
/// Stems match at the start of a word, so compounds such as "agroganadera"
/// need a stem of their own.
pub const RURAL_INCLUSION_STEMS: &[&str] = &[
    "agricol",
    "agricul",
    "agrari",
    "agroaliment",
    "agroambient",
    "agroganad",
    "agropecuari",
    "ganad",
    "ganaderi",
    "pecuari",
    "zootecn",
    "sanidad animal",
    "bienestar animal",
    "apicul",
    "rural",
    "forestal",
    "montes",
    "aprovechamiento forestal",
    "incendios forestales",
    "regadio",
    "regante",
    "riego",
    "subvenc",
    "ayudas a",
    "politica agraria comun",
    "feader",
    "feaga",
    "desarrollo rural",
    "explotaciones",
    "cultivo",
    "cosecha",
    "fitosanit",
    "viticul",
    "vitivinic",
    "olivar",
    "cereal",
    "semilla",
    "fertiliz",
    "pastos",
    "trashuman",
    "cooperativas agr",
    "seguros agrarios",
    "jovenes agricultores",
    "sequia",
];

/// Generic municipal/administrative noise. Any match rejects the provision.
pub const STRONG_EXCLUSION_STEMS: &[&str] = &[
    "ayuntamiento",
    "oposicion",
    "proceso selectivo",
    "pruebas selectivas",
    "bolsa de empleo",
    "oferta de empleo publico",
    "nombramiento",
    "personal funcionario",
    "licitacion",
    "formalizacion del contrato",
    "padron",
    "ordenanza fiscal",
    "recaudacion",
    "edicto",
    "juzgado",
    "emplazamiento",
    "plan general de ordenacion urbana",
    "urbanis",
];

/// Headings that open a provision in regional bulletins.
fn regional_headings(department_prefix: &str) -> Vec<String> {
    vec![
        r"\bORDEN\s+[A-Z]{0,4}/?\d*/?\d*,?\s*de\b".to_string(),
        r"\bRESOLUCI[ÓO]N\s+de\b".to_string(),
        r"\bDECRETO\s+\d+/\d{4}".to_string(),
        r"\bACUERDO\s+de\b".to_string(),
        r"\bANUNCIO\s+de\b".to_string(),
        r"\bEXTRACTO\s+de\b".to_string(),
        format!(r"\b{}\s+DE\s+[A-ZÁÉÍÓÚÑ]", department_prefix),
    ]
}

fn stems(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn regional(
    tag: SourceTag,
    name: &'static str,
    region: &'static str,
    department_prefix: &str,
) -> SourceProfile {
    SourceProfile {
        tag,
        name,
        region,
        document_kind: DocumentKind::Pdf,
        listing_format: ListingFormat::Feed,
        listing_url: None,
        token: None,
        date_format: "%Y%m%d".to_string(),
        heading_patterns: regional_headings(department_prefix),
        relevance: RelevanceRule::Body {
            inclusion_stems: stems(RURAL_INCLUSION_STEMS),
            exclusion_stems: stems(STRONG_EXCLUSION_STEMS),
        },
        title_rule: TitleRule::LeadingText,
        identity_key: IdentityKeyRule::UrlAndTitle,
    }
}

pub fn builtin_profile(tag: SourceTag) -> SourceProfile {
    match tag {
        SourceTag::Boe => SourceProfile {
            tag,
            name: "Boletín Oficial del Estado",
            region: "Estatal",
            document_kind: DocumentKind::Structured,
            listing_format: ListingFormat::Json,
            listing_url: None,
            token: None,
            date_format: "%Y%m%d".to_string(),
            heading_patterns: Vec::new(),
            relevance: RelevanceRule::Title {
                // Ministry codes embedded in national order numbers, e.g. "Orden APA/123/2024".
                department_pattern: r"(?i)\b(APA|TED)/\d+/\d{4}|\bagricultura,\s+pesca\s+y\s+alimentaci[óo]n"
                    .to_string(),
                interest_pattern: r"(?i)\b(agr[ií]col|agrari|ganader|rural|forestal|regad[ií]o|riego|pol[ií]tica agr[ií]cola com[úu]n|sanidad animal|fitosanitari|desarrollo rural|explotaciones agrarias|cosecha|sequ[ií]a)"
                    .to_string(),
                exclusion_pattern: r"(?i)\b(oposici[óo]n|proceso selectivo|pruebas selectivas|nombramiento|cese|jubilaci[óo]n|licitaci[óo]n|formalizaci[óo]n|condecoraci[óo]n|indulto|ayuntamiento)"
                    .to_string(),
            },
            title_rule: TitleRule::ItemTitle,
            identity_key: IdentityKeyRule::Url,
        },
        SourceTag::Boja => regional(
            tag,
            "Boletín Oficial de la Junta de Andalucía",
            "Andalucía",
            "CONSEJER[ÍI]A",
        ),
        SourceTag::Boa => regional(tag, "Boletín Oficial de Aragón", "Aragón", "DEPARTAMENTO"),
        SourceTag::Bocyl => regional(
            tag,
            "Boletín Oficial de Castilla y León",
            "Castilla y León",
            "CONSEJER[ÍI]A",
        ),
        SourceTag::Docm => regional(
            tag,
            "Diario Oficial de Castilla-La Mancha",
            "Castilla-La Mancha",
            "CONSEJER[ÍI]A",
        ),
        SourceTag::Doe => regional(
            tag,
            "Diario Oficial de Extremadura",
            "Extremadura",
            "CONSEJER[ÍI]A",
        ),
    }
}

/// Print every built-in source and whether it can run with this config.
pub fn list_sources(config: &Config) -> Result<()> {
    println!(
        "{:<8} {:<20} {:<11} {:<8} STATUS",
        "SOURCE", "REGION", "KIND", "LISTING"
    );

    for tag in SourceTag::ALL {
        let profile = SourceProfile::from_config(config, tag);
        let enabled = config.source(tag).map(|s| s.enabled).unwrap_or(true);
        let status = match (&profile.listing_url, enabled) {
            (None, _) => "NOT CONFIGURED",
            (Some(_), false) => "DISABLED",
            (Some(_), true) => "OK",
        };
        let kind = match profile.document_kind {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Structured => "structured",
        };
        let listing = match profile.listing_format {
            ListingFormat::Feed => "feed",
            ListingFormat::Json => "json",
        };
        println!(
            "{:<8} {:<20} {:<11} {:<8} {}",
            tag.as_str(),
            profile.region,
            kind,
            listing,
            status
        );
    }

    Ok(())
}
