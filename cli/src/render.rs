use textcritical_backend::html_transformer::PresentationNode;

/// HTML for a presentation tree.
pub fn to_html(node: &PresentationNode) -> String {
    let mut html = String::new();
    write_node(&mut html, node);
    html
}

fn write_node(html: &mut String, node: &PresentationNode) {
    match node {
        PresentationNode::Text { text } => {
            html.push_str(&html_escape::encode_text(text));
        }
        PresentationNode::Element { tag, class, attributes, children } => {
            html.push_str(&format!("<{} class=\"{}\"", tag, html_escape::encode_double_quoted_attribute(class)));
            for (name, value) in attributes {
                html.push_str(&format!(" {}=\"{}\"", name, html_escape::encode_double_quoted_attribute(value)));
            }
            html.push('>');
            for child in children {
                write_node(html, child);
            }
            html.push_str(&format!("</{}>", tag));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use textcritical_backend::html_transformer::convert_xml;
    use textcritical_backend::language_tools::Language;

    #[test]
    fn test_to_html() {
        let node = convert_xml(r#"<l n="1">MH=NIN &amp; A)/EIDE</l>"#, Some(&Language::Greek)).unwrap();
        assert_eq!(to_html(&node), r#"<span class="l" data-n="1">μῆνιν &amp; ἄειδε</span>"#);
    }
}
