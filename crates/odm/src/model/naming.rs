//! Collection naming - derives a collection name from a model type name

/// Snake-cased, pluralised name of `T`'s last path segment, ignoring generics.
pub fn collection_name_for<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let without_generics = full.split('<').next().unwrap_or(full);
    let short = without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics);
    pluralize(&to_snake_case(short))
}

pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let acronym_end = i > 0
                && chars[i - 1].is_uppercase()
                && chars.get(i + 1).map_or(false, |n| n.is_lowercase());
            if prev_lower || acronym_end {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Simple English pluralisation of the last word of a snake_case name
pub fn pluralize(name: &str) -> String {
    let (head, word) = match name.rfind('_') {
        Some(idx) => name.split_at(idx + 1),
        None => ("", name),
    };

    let plural = match word {
        "person" => "people".to_string(),
        "child" => "children".to_string(),
        "man" => "men".to_string(),
        "woman" => "women".to_string(),
        "mouse" => "mice".to_string(),
        _ if word.ends_with('y')
            && !word.ends_with("ay")
            && !word.ends_with("ey")
            && !word.ends_with("iy")
            && !word.ends_with("oy")
            && !word.ends_with("uy") =>
        {
            format!("{}ies", &word[..word.len() - 1])
        }
        _ if word.ends_with('s')
            || word.ends_with("sh")
            || word.ends_with("ch")
            || word.ends_with('x')
            || word.ends_with('z') =>
        {
            format!("{}es", word)
        }
        _ => format!("{}s", word),
    };

    format!("{}{}", head, plural)
}
