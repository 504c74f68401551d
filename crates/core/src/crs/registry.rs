//! CRS identifier resolution
//!
//! The registry is an explicit value: callers build one (usually with
//! [`CrsRegistry::with_defaults`]) and pass it where identifiers need
//! resolving. Independent registries can coexist in one process.

use super::{CrsDefinition, Datum, DatumShift, Ellipsoid, Projection, CRS};
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Resolves CRS identifiers (EPSG codes, URNs, PROJ strings, WKT) to [`CRS`] values.
#[derive(Debug, Clone, Default)]
pub struct CrsRegistry {
    /// Caller registrations, keyed by normalised identifier
    entries: HashMap<String, CrsDefinition>,
    /// Whether the built-in EPSG table and the crs-definitions catalogue are consulted
    builtins: bool,
}

impl CrsRegistry {
    /// Create an empty registry that resolves nothing until entries are registered
    pub fn new() -> Self {
        Self { entries: HashMap::new(), builtins: false }
    }

    /// Create a registry backed by the built-in EPSG table, falling back to
    /// the crs-definitions catalogue for other EPSG codes
    pub fn with_defaults() -> Self {
        Self { entries: HashMap::new(), builtins: true }
    }

    /// Register (or override) a definition under an identifier
    pub fn register(&mut self, identifier: &str, definition: CrsDefinition) {
        self.entries.insert(normalize(identifier), definition);
    }

    /// Number of caller registrations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve an identifier to a CRS
    pub fn resolve(&self, identifier: &str) -> Result<CRS> {
        let trimmed = identifier.trim();
        if trimmed.is_empty() {
            return Err(Error::UnknownCrs(identifier.to_string()));
        }

        if trimmed.starts_with('+') {
            let definition = parse_proj(trimmed)?;
            return Ok(CRS::new(trimmed, definition));
        }

        let key = if looks_like_wkt(trimmed) {
            wkt_authority(trimmed).ok_or_else(|| Error::UnknownCrs(abbreviate(trimmed)))?
        } else {
            normalize(trimmed)
        };

        if let Some(def) = self.entries.get(&key) {
            return Ok(CRS::new(key, def.clone()));
        }

        if self.builtins {
            if let Some(def) = builtin(&key) {
                return Ok(CRS::new(key, def));
            }
            if let Some(parsed) = catalogued(&key) {
                return parsed.map(|def| CRS::new(key.clone(), def)).map_err(|e| match e {
                    Error::UnknownCrs(why) => Error::UnknownCrs(format!("{}: {}", key, why)),
                    other => other,
                });
            }
        }

        Err(Error::UnknownCrs(abbreviate(trimmed)))
    }
}

/// Bring the common spellings of an identifier to `AUTHORITY:CODE`.
fn normalize(identifier: &str) -> String {
    let upper = identifier.trim().to_ascii_uppercase();

    if upper.chars().all(|c| c.is_ascii_digit()) {
        return format!("EPSG:{}", upper);
    }
    if let Some(code) = upper.strip_prefix("URN:OGC:DEF:CRS:EPSG::") {
        return format!("EPSG:{}", code);
    }
    if let Some(rest) = upper.strip_prefix("URN:OGC:DEF:CRS:OGC:") {
        // urn:ogc:def:crs:OGC:1.3:CRS84
        if let Some(name) = rest.rsplit(':').next() {
            return format!("OGC:{}", name);
        }
    }
    if upper == "CRS84" {
        return "OGC:CRS84".to_string();
    }
    upper
}

fn looks_like_wkt(s: &str) -> bool {
    const ROOTS: [&str; 8] = [
        "GEOGCS[", "PROJCS[", "GEOGCRS[", "PROJCRS[", "GEODCRS[", "BASEGEOGCRS[", "LOCAL_CS[", "ENGCRS[",
    ];
    let upper = s.to_ascii_uppercase();
    ROOTS.iter().any(|root| upper.starts_with(root))
}

/// Pull the outermost EPSG authority out of a WKT string.
///
/// WKT1 puts it last as `AUTHORITY["EPSG","4326"]`, WKT2 as `ID["EPSG",4326]`.
fn wkt_authority(wkt: &str) -> Option<String> {
    let upper = wkt.to_ascii_uppercase();
    let pos = upper
        .rfind("AUTHORITY[\"EPSG\",")
        .map(|p| p + "AUTHORITY[\"EPSG\",".len())
        .or_else(|| upper.rfind("ID[\"EPSG\",").map(|p| p + "ID[\"EPSG\",".len()))?;

    let code: String = upper[pos..]
        .chars()
        .skip_while(|c| *c == '"' || c.is_whitespace())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    if code.is_empty() {
        None
    } else {
        Some(format!("EPSG:{}", code))
    }
}

fn abbreviate(s: &str) -> String {
    if s.len() <= 60 {
        s.to_string()
    } else {
        let cut = (0..=60).rev().find(|i| s.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &s[..cut])
    }
}

/// Built-in EPSG table
fn builtin(key: &str) -> Option<CrsDefinition> {
    if key == "OGC:CRS84" {
        return Some(CrsDefinition::geographic(Datum::wgs84()));
    }

    let code: u32 = key.strip_prefix("EPSG:")?.parse().ok()?;
    let def = match code {
        4326 => CrsDefinition::geographic(Datum::wgs84()),
        4269 | 4258 => CrsDefinition::geographic(Datum::grs80()),
        4230 => CrsDefinition::geographic(Datum::ed50()),
        4277 => CrsDefinition::geographic(Datum::osgb36()),
        3857 | 900913 => CrsDefinition { datum: Datum::wgs84(), projection: Projection::WebMercator },
        32601..=32660 => CrsDefinition::utm(Datum::wgs84(), code - 32600, true),
        32701..=32760 => CrsDefinition::utm(Datum::wgs84(), code - 32700, false),
        25828..=25838 => CrsDefinition::utm(Datum::grs80(), code - 25800, true),
        23028..=23038 => CrsDefinition::utm(Datum::ed50(), code - 23000, true),
        27700 => CrsDefinition {
            datum: Datum::osgb36(),
            projection: Projection::TransverseMercator {
                lon0: -2.0,
                lat0: 49.0,
                k0: 0.999_601_271_7,
                false_easting: 400_000.0,
                false_northing: -100_000.0,
            },
        },
        _ => return None,
    };
    Some(def)
}

/// EPSG codes outside the built-in table, looked up in the crs-definitions
/// catalogue and parsed like any PROJ string
fn catalogued(key: &str) -> Option<Result<CrsDefinition>> {
    let code: u16 = key.strip_prefix("EPSG:")?.parse().ok()?;
    let def = crs_definitions::from_code(code)?;
    Some(parse_proj(def.proj4))
}

/// Parse the subset of PROJ strings this crate can transform.
fn parse_proj(proj: &str) -> Result<CrsDefinition> {
    let unknown = |why: &str| Error::UnknownCrs(format!("{} ({})", abbreviate(proj), why));

    let mut params: HashMap<String, Option<String>> = HashMap::new();
    for token in proj.split_whitespace() {
        let token = token.trim_start_matches('+');
        match token.split_once('=') {
            Some((k, v)) => params.insert(k.to_ascii_lowercase(), Some(v.to_string())),
            None => params.insert(token.to_ascii_lowercase(), None),
        };
    }

    let number = |key: &str, default: f64| -> Result<f64> {
        match params.get(key) {
            Some(Some(v)) => v.parse().map_err(|_| unknown(&format!("bad +{}", key))),
            Some(None) => Err(unknown(&format!("+{} needs a value", key))),
            None => Ok(default),
        }
    };

    if let Some(Some(units)) = params.get("units") {
        if units != "m" {
            return Err(unknown("only metre units are supported"));
        }
    }

    let datum = proj_datum(&params).map_err(|why| unknown(&why))?;

    let proj_name = match params.get("proj") {
        Some(Some(p)) => p.as_str(),
        _ => return Err(unknown("missing +proj")),
    };

    let projection = match proj_name {
        "longlat" | "latlong" | "lonlat" | "latlon" => Projection::Geographic,
        "merc" => {
            let a = number("a", datum.ellipsoid.a)?;
            let b = number("b", datum.ellipsoid.a * (1.0 - datum.ellipsoid.f))?;
            if (a - b).abs() > 1e-6 || number("lon_0", 0.0)? != 0.0 || number("k", 1.0)? != 1.0 {
                return Err(unknown("only spherical Web Mercator is supported"));
            }
            Projection::WebMercator
        }
        "utm" => {
            let zone = number("zone", f64::NAN)?;
            if !zone.is_finite() || zone.fract() != 0.0 || !(1.0..=60.0).contains(&zone) {
                return Err(unknown("+zone must be 1..=60"));
            }
            let north = !params.contains_key("south");
            return Ok(CrsDefinition::utm(datum, zone as u32, north));
        }
        "tmerc" => Projection::TransverseMercator {
            lon0: number("lon_0", 0.0)?,
            lat0: number("lat_0", 0.0)?,
            k0: match params.get("k_0") {
                Some(_) => number("k_0", 1.0)?,
                None => number("k", 1.0)?,
            },
            false_easting: number("x_0", 0.0)?,
            false_northing: number("y_0", 0.0)?,
        },
        other => return Err(unknown(&format!("projection '{}' not supported", other))),
    };

    Ok(CrsDefinition { datum, projection })
}

fn proj_datum(params: &HashMap<String, Option<String>>) -> std::result::Result<Datum, String> {
    let towgs84 = match params.get("towgs84") {
        Some(Some(v)) => {
            let parts: Vec<f64> = v
                .split(',')
                .map(|p| p.trim().parse::<f64>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| "bad +towgs84".to_string())?;
            if parts.len() < 3 {
                return Err("+towgs84 needs at least three values".to_string());
            }
            if parts[3..].iter().any(|p| *p != 0.0) {
                return Err("only three-parameter +towgs84 shifts are supported".to_string());
            }
            Some([parts[0], parts[1], parts[2]])
        }
        Some(None) => return Err("+towgs84 needs a value".to_string()),
        None => None,
    };

    if let Some(Some(datum)) = params.get("datum") {
        let mut d = match datum.to_ascii_uppercase().as_str() {
            "WGS84" => Datum::wgs84(),
            "NAD83" => Datum::grs80(),
            "OSGB36" => Datum::osgb36(),
            "ED50" => Datum::ed50(),
            other => return Err(format!("datum '{}' not supported", other)),
        };
        if let Some(t) = towgs84 {
            d.shift = DatumShift::ToWgs84(t);
        }
        return Ok(d);
    }

    let (ellipsoid, name) = match params.get("ellps") {
        Some(Some(e)) => match e.to_ascii_lowercase().as_str() {
            "wgs84" => (Ellipsoid::WGS84, "WGS84"),
            "grs80" => (Ellipsoid::GRS80, "GRS80"),
            "airy" => (Ellipsoid::AIRY_1830, "airy"),
            "intl" => (Ellipsoid::INTERNATIONAL_1924, "intl"),
            other => return Err(format!("ellipsoid '{}' not supported", other)),
        },
        Some(None) => return Err("+ellps needs a value".to_string()),
        None => (Ellipsoid::WGS84, "WGS84"),
    };

    let shift = match towgs84 {
        Some(t) => DatumShift::ToWgs84(t),
        // WGS84 and GRS80 differ by well under a millimetre
        None if name == "WGS84" || name == "GRS80" => DatumShift::ToWgs84([0.0; 3]),
        None => DatumShift::Unlinked(format!("ellps={}", name)),
    };

    Ok(Datum { ellipsoid, shift })
}
