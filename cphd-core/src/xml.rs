//! Минимальное извлечение элементов из XML-блока.
//!
//! Не парсер и не валидатор: находит элементы по локальному имени и отдаёт
//! их внутренний текст. Валидация по схеме выполняется внешними средствами.
//! Предполагается, что элемент не вложен в элемент с тем же именем.

/// Первый элемент `name` в `src`: его внутреннее содержимое.
pub fn element<'a>(
    src: &'a str,
    name: &str,
) -> Option<&'a str> {
    Elements::new(src, name).next()
}

/// Все элементы `name` в `src` (без рекурсии внутрь найденных).
pub fn elements<'a>(
    src: &'a str,
    name: &str,
) -> Vec<&'a str> {
    Elements::new(src, name).collect()
}

/// Текст элемента `name` без пробелов по краям и с раскрытыми сущностями.
pub fn text(
    src: &str,
    name: &str,
) -> Option<String> {
    element(src, name).map(|s| unescape(s.trim()))
}

/// Прямые дочерние элементы: пары (локальное имя, содержимое).
pub fn children(src: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    let mut pos = 0;

    while let Some(rel) = src[pos..].find('<') {
        let start = pos + rel;
        let rest = &src[start + 1..];

        // Комментарии, инструкции и закрывающие теги пропускаем
        if rest.starts_with("!--") {
            pos = match rest.find("-->") {
                Some(e) => start + 1 + e + 3,
                None => break,
            };
            continue;
        }
        if rest.starts_with('?') || rest.starts_with('!') || rest.starts_with('/') {
            pos = match rest.find('>') {
                Some(e) => start + 1 + e + 1,
                None => break,
            };
            continue;
        }

        let name_len = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(rest.len());
        let qname = &rest[..name_len];

        match open_tag_span(src, start, qname) {
            Some((inner, next)) => {
                out.push((local_name(qname), inner));
                pos = next;
            }
            None => break,
        }
    }

    out
}

/// Итератор по элементам с заданным локальным именем.
struct Elements<'a, 'n> {
    src: &'a str,
    name: &'n str,
    pos: usize,
}

impl<'a, 'n> Elements<'a, 'n> {
    fn new(
        src: &'a str,
        name: &'n str,
    ) -> Self {
        Self { src, name, pos: 0 }
    }
}

impl<'a> Iterator for Elements<'a, '_> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(rel) = self.src[self.pos..].find('<') {
            let start = self.pos + rel;
            let rest = &self.src[start + 1..];

            if rest.starts_with("!--") {
                self.pos = start + 1 + rest.find("-->")? + 3;
                continue;
            }

            let name_len = rest
                .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
                .unwrap_or(rest.len());
            let qname = &rest[..name_len];

            if qname.is_empty() || local_name(qname) != self.name {
                self.pos = start + 1;
                continue;
            }

            let (inner, next) = open_tag_span(self.src, start, qname)?;
            self.pos = next;
            return Some(inner);
        }

        None
    }
}

/// Для открывающего тега в позиции `start` возвращает содержимое элемента и
/// позицию сразу за закрывающим тегом.
fn open_tag_span<'a>(
    src: &'a str,
    start: usize,
    qname: &str,
) -> Option<(&'a str, usize)> {
    let tag_end = start + src[start..].find('>')?;

    if src[..tag_end].ends_with('/') {
        return Some(("", tag_end + 1));
    }

    let close = format!("</{qname}>");
    let inner_start = tag_end + 1;
    let close_at = inner_start + src[inner_start..].find(&close)?;

    Some((&src[inner_start..close_at], close_at + close.len()))
}

fn local_name(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0"?>
<CPHD xmlns="http://api.nsgreg.nga.mil/schema/cphd/1.0.1">
  <!-- comment with <Data> inside -->
  <Data>
    <SignalArrayFormat>CI4</SignalArrayFormat>
    <Channel><Identifier>A&amp;B</Identifier></Channel>
    <Channel><Identifier>C</Identifier></Channel>
    <Empty/>
  </Data>
</CPHD>"#;

    #[test]
    fn test_element_and_text() {
        let data = element(DOC, "Data").unwrap();

        assert_eq!(text(data, "SignalArrayFormat").as_deref(), Some("CI4"));
        assert_eq!(element(data, "Empty"), Some(""));
        assert_eq!(element(data, "Missing"), None);
    }

    #[test]
    fn test_elements_and_unescape() {
        let data = element(DOC, "Data").unwrap();
        let ids: Vec<_> = elements(data, "Channel")
            .into_iter()
            .filter_map(|c| text(c, "Identifier"))
            .collect();

        assert_eq!(ids, vec!["A&B".to_string(), "C".to_string()]);
    }

    #[test]
    fn test_children() {
        let data = element(DOC, "Data").unwrap();
        let names: Vec<_> = children(data).into_iter().map(|(n, _)| n).collect();

        assert_eq!(names, vec!["SignalArrayFormat", "Channel", "Channel", "Empty"]);
    }

    #[test]
    fn test_namespace_prefix() {
        let doc = "<c:Data><c:NumVectors>7</c:NumVectors></c:Data>";
        let data = element(doc, "Data").unwrap();

        assert_eq!(text(data, "NumVectors").as_deref(), Some("7"));
    }

    #[test]
    fn test_prefix_name_not_confused() {
        let doc = "<DataX>1</DataX><Data>2</Data>";

        assert_eq!(element(doc, "Data"), Some("2"));
    }
}
