//! Minimal vendor page fixtures carrying only the markup the adapters read

/// Kaspersky gantt list; items are (title, version, release date)
pub fn kaspersky_page(items: &[(&str, &str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(title, version, release)| {
            format!(
                r#"<div class="product-gantt__list-item">
                     <div class="product-gantt__list-item-title">{title}</div>
                     <div class="product-gantt__list-item-version">{version}</div>
                     <div class="product-gantt__extra-info-item">
                       <div class="product-gantt__extra-info-title">Релиз</div>
                       <div class="product-gantt__extra-info-value">{release}</div>
                     </div>
                   </div>"#
            )
        })
        .collect();

    format!(r#"<html><body><div class="product-gantt__list-items">{items}</div></body></html>"#)
}

/// UserGate release notes; releases are (heading, status)
pub fn usergate_page(releases: &[(&str, &str)]) -> String {
    let releases: String = releases
        .iter()
        .map(|(title, status)| {
            format!(
                r#"<h2><skip-glossary>{title}</skip-glossary></h2>
                   <div class="textBlock">Статус: {status}</div>"#
            )
        })
        .collect();

    format!("<html><body>{releases}</body></html>")
}

/// Security Code lifecycle table; rows are (product, version, date)
pub fn securitycode_page(rows: &[(&str, &str, &str)]) -> String {
    let rows: String = rows
        .iter()
        .map(|(name, version, date)| {
            format!(
                r#"<tr class="common-table__row-non-rwd">
                     <td class="common-table__cell-non-rwd">{name}</td>
                     <td class="common-table__cell-non-rwd">{version}</td>
                     <td class="common-table__cell-non-rwd">{date}</td>
                   </tr>"#
            )
        })
        .collect();

    format!(
        r#"<html><body><div class="container"><div class="inside-container"><div>
             <div></div><div></div><div></div><div></div>
             <div><table>{rows}</table></div>
           </div></div></div></body></html>"#
    )
}
