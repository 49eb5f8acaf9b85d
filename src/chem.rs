//! Periodic-table helpers shared by the mention recognizer and the PubChem
//! client.

/// Element symbols indexed by atomic number − 1.
pub const SYMBOLS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Symbol for an atomic number (1-based).
pub fn symbol(atomic_number: u32) -> Option<&'static str> {
    let idx = usize::try_from(atomic_number).ok()?.checked_sub(1)?;
    SYMBOLS.get(idx).copied()
}

pub fn is_symbol(s: &str) -> bool {
    SYMBOLS.contains(&s)
}

/// Split a formula-looking token into element symbols.
///
/// Returns `None` unless the whole token is a sequence of valid symbols, each
/// optionally followed by a count. Charges (`+`/`-`) at the end are allowed.
/// `"H2SO4"` → `["H", "S", "O"]`.
pub fn formula_symbols(token: &str) -> Option<Vec<&'static str>> {
    let body = token.trim_end_matches(['+', '-']);
    let chars: Vec<char> = body.chars().collect();
    if chars.is_empty() {
        return None;
    }

    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if !c.is_ascii_uppercase() {
            return None;
        }
        // Prefer the two-letter symbol when both readings are valid.
        let two = chars
            .get(i + 1)
            .filter(|n| n.is_ascii_lowercase())
            .map(|n| format!("{c}{n}"));
        let sym = match two.as_deref().and_then(find) {
            Some(s) => {
                i += 2;
                s
            }
            None => {
                i += 1;
                find(&c.to_string())?
            }
        };
        out.push(sym);
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    Some(out)
}

fn find(s: &str) -> Option<&'static str> {
    SYMBOLS.iter().copied().find(|sym| *sym == s)
}
