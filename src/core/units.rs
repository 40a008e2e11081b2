//! Unit-of-measure normalization.
//!
//! Suppliers write the commercial unit (`uCom`) however they like: "UN",
//! "Und", "UNID", "pç", "Kg", "KILO". Each known spelling maps onto one
//! canonical token per unit family so that imported lines and catalog
//! products compare equal. Unknown units pass through unchanged.

/// Normalize a unit string to its canonical token.
///
/// Matching ignores case, surrounding whitespace and a trailing period.
/// Unrecognized units are returned as given (trimmed).
pub fn normalize_unit(raw: &str) -> String {
    let trimmed = raw.trim();
    let key = trimmed.trim_end_matches('.').to_uppercase();
    match UNIT_SYNONYMS.binary_search_by(|(synonym, _)| synonym.cmp(&key.as_str())) {
        Ok(idx) => UNIT_SYNONYMS[idx].1.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// Whether `unit` is one of the canonical tokens.
pub fn is_canonical_unit(unit: &str) -> bool {
    UNIT_SYNONYMS.iter().any(|(_, canonical)| *canonical == unit)
}

/// Known spellings and their canonical token. Sorted by spelling for binary search.
static UNIT_SYNONYMS: &[(&str, &str)] = &[
    ("CAIXA", "CX"),
    ("CT", "CX"),
    ("CX", "CX"),
    ("DUZIA", "DZ"),
    ("DZ", "DZ"),
    ("DÚZIA", "DZ"),
    ("FARDO", "FD"),
    ("FD", "FD"),
    ("G", "G"),
    ("GR", "G"),
    ("GRAMA", "G"),
    ("GRS", "G"),
    ("K", "KG"),
    ("KG", "KG"),
    ("KGS", "KG"),
    ("KILO", "KG"),
    ("KILOGRAMA", "KG"),
    ("L", "L"),
    ("LITRO", "L"),
    ("LT", "L"),
    ("LTS", "L"),
    ("M", "M"),
    ("M2", "M2"),
    ("M3", "M3"),
    ("METRO", "M"),
    ("ML", "ML"),
    ("MT", "M"),
    ("MTR", "M"),
    ("MTS", "M"),
    ("M²", "M2"),
    ("M³", "M3"),
    ("PACOTE", "PCT"),
    ("PAR", "PAR"),
    ("PC", "UN"),
    ("PCS", "UN"),
    ("PCT", "PCT"),
    ("PECA", "UN"),
    ("PEÇA", "UN"),
    ("PR", "PAR"),
    ("PÇ", "UN"),
    ("PÇA", "UN"),
    ("PÇS", "UN"),
    ("QUILO", "KG"),
    ("RL", "RL"),
    ("ROLO", "RL"),
    ("SACO", "SC"),
    ("SC", "SC"),
    ("T", "TON"),
    ("TON", "TON"),
    ("TONELADA", "TON"),
    ("U", "UN"),
    ("UN", "UN"),
    ("UND", "UN"),
    ("UNI", "UN"),
    ("UNID", "UN"),
    ("UNIDADE", "UN"),
    ("UNIT", "UN"),
];
