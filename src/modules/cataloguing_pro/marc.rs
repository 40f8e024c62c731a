// MARC Record Parser
// Reads MARCXML, either wrapped in an SRU searchRetrieveResponse or as a bare collection,
// into a small field/subfield tree.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::domain::DomainError;
use crate::modules::matching::normalize::present;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarcRecord {
    pub control_fields: Vec<ControlField>,
    pub fields: Vec<MarcField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlField {
    pub tag: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarcField {
    pub tag: String,
    pub ind1: char,
    pub ind2: char,
    pub subfields: Vec<Subfield>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subfield {
    pub code: char,
    pub value: String,
}

impl MarcRecord {
    pub fn fields<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a MarcField> + 'a {
        self.fields.iter().filter(move |f| f.tag == tag)
    }

    pub fn first_field(&self, tag: &str) -> Option<&MarcField> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    pub fn control_field(&self, tag: &str) -> Option<&str> {
        self.control_fields
            .iter()
            .find(|f| f.tag == tag)
            .map(|f| f.value.as_str())
    }
}

impl MarcField {
    /// Values of every `code` subfield, skipping blanks and "N/A" placeholders
    pub fn subfield_values(&self, code: char) -> impl Iterator<Item = String> + '_ {
        self.subfields
            .iter()
            .filter(move |s| s.code == code)
            .filter_map(|s| present(&s.value))
    }

    pub fn subfield(&self, code: char) -> Option<String> {
        self.subfield_values(code).next()
    }
}

/// Everything a catalog search response carried
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    pub number_of_records: Option<u64>,
    pub records: Vec<MarcRecord>,
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Capture {
    Nothing,
    NumberOfRecords,
    ControlField,
    Subfield,
    Diagnostic,
}

fn attribute(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).trim().to_string())
}

fn indicator(e: &BytesStart, name: &[u8]) -> char {
    attribute(e, name)
        .and_then(|v| v.chars().next())
        .unwrap_or(' ')
}

/// Parse a MARCXML payload into records. Element prefixes and namespaces are ignored.
pub fn parse_marc_xml(xml: &str) -> Result<SearchResponse, DomainError> {
    if xml.trim().is_empty() {
        return Err(DomainError::Parse("empty payload".to_string()));
    }

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut response = SearchResponse::default();
    let mut buf = Vec::new();

    let mut depth = 0usize;
    let mut in_diagnostics = false;
    let mut record: Option<(usize, MarcRecord)> = None;
    let mut field: Option<MarcField> = None;
    let mut control_tag = String::new();
    let mut subfield_code = ' ';
    let mut capture = Capture::Nothing;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                match e.local_name().as_ref() {
                    b"recordData" | b"record" if record.is_none() => {
                        record = Some((depth, MarcRecord::default()));
                    }
                    b"numberOfRecords" => {
                        capture = Capture::NumberOfRecords;
                        text.clear();
                    }
                    b"diagnostics" => in_diagnostics = true,
                    b"message" if in_diagnostics => {
                        capture = Capture::Diagnostic;
                        text.clear();
                    }
                    b"controlfield" if record.is_some() => {
                        control_tag = attribute(&e, b"tag").unwrap_or_default();
                        capture = Capture::ControlField;
                        text.clear();
                    }
                    b"datafield" if record.is_some() => {
                        field = Some(MarcField {
                            tag: attribute(&e, b"tag").unwrap_or_default(),
                            ind1: indicator(&e, b"ind1"),
                            ind2: indicator(&e, b"ind2"),
                            subfields: Vec::new(),
                        });
                    }
                    b"subfield" if field.is_some() => {
                        subfield_code = attribute(&e, b"code")
                            .and_then(|c| c.chars().next())
                            .unwrap_or(' ');
                        capture = Capture::Subfield;
                        text.clear();
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if capture != Capture::Nothing {
                    let chunk = e
                        .unescape()
                        .map_err(|err| DomainError::Parse(format!("Bad XML text: {}", err)))?;
                    text.push_str(&chunk);
                }
            }
            Ok(Event::CData(e)) => {
                if capture != Capture::Nothing {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"numberOfRecords" => {
                        response.number_of_records = text.trim().parse().ok();
                        capture = Capture::Nothing;
                    }
                    b"diagnostics" => in_diagnostics = false,
                    b"message" if capture == Capture::Diagnostic => {
                        response.diagnostics.push(text.trim().to_string());
                        capture = Capture::Nothing;
                    }
                    b"controlfield" if capture == Capture::ControlField => {
                        if let Some((_, current)) = record.as_mut() {
                            current.control_fields.push(ControlField {
                                tag: std::mem::take(&mut control_tag),
                                value: text.trim().to_string(),
                            });
                        }
                        capture = Capture::Nothing;
                    }
                    b"subfield" if capture == Capture::Subfield => {
                        if let Some(current) = field.as_mut() {
                            current.subfields.push(Subfield {
                                code: subfield_code,
                                value: text.trim().to_string(),
                            });
                        }
                        capture = Capture::Nothing;
                    }
                    b"datafield" => {
                        if let (Some(done), Some((_, current))) = (field.take(), record.as_mut()) {
                            current.fields.push(done);
                        }
                    }
                    b"recordData" | b"record" => {
                        if record.as_ref().is_some_and(|(start, _)| *start == depth)
                            && let Some((_, done)) = record.take()
                        {
                            response.records.push(done);
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DomainError::Parse(format!(
                    "XML parse error at byte {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => (),
        }
        buf.clear();
    }

    if response.records.is_empty()
        && response.number_of_records.is_none()
        && response.diagnostics.is_empty()
    {
        return Err(DomainError::Parse(
            "payload holds neither catalog records nor a result count".to_string(),
        ));
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRU_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<searchRetrieveResponse xmlns="http://www.loc.gov/zing/srw/">
  <version>1.1</version>
  <numberOfRecords>1</numberOfRecords>
  <records>
    <record>
      <recordSchema>info:srw/schema/1/marcxml</recordSchema>
      <recordPacking>xml</recordPacking>
      <recordData>
        <record xmlns="http://www.loc.gov/MARC21/slim">
          <leader>00000cam a2200000 a 4500</leader>
          <controlfield tag="001">52357289</controlfield>
          <datafield tag="020" ind1=" " ind2=" ">
            <subfield code="a">9780743273565 (pbk.)</subfield>
          </datafield>
          <datafield tag="245" ind1="1" ind2="4">
            <subfield code="a">The great Gatsby /</subfield>
            <subfield code="c">F. Scott Fitzgerald.</subfield>
          </datafield>
          <datafield tag="260" ind1=" " ind2=" ">
            <subfield code="a">New York :</subfield>
            <subfield code="b">Scribner &amp; Sons,</subfield>
          </datafield>
        </record>
      </recordData>
      <recordPosition>1</recordPosition>
    </record>
  </records>
</searchRetrieveResponse>"#;

    #[test]
    fn test_parse_sru_wrapped_record() {
        let response = parse_marc_xml(SRU_RESPONSE).unwrap();
        assert_eq!(response.number_of_records, Some(1));
        assert_eq!(response.records.len(), 1);

        let record = &response.records[0];
        assert_eq!(record.control_field("001"), Some("52357289"));
        let title = record.first_field("245").unwrap();
        assert_eq!(title.ind2, '4');
        assert_eq!(title.subfield('a').as_deref(), Some("The great Gatsby /"));
        assert_eq!(
            record.first_field("260").unwrap().subfield('b').as_deref(),
            Some("Scribner & Sons,")
        );
    }

    #[test]
    fn test_parse_prefixed_collection() {
        let xml = r#"<marc:collection xmlns:marc="http://www.loc.gov/MARC21/slim">
            <marc:record>
              <marc:datafield tag="245" ind1="0" ind2="0"><marc:subfield code="a">First</marc:subfield></marc:datafield>
            </marc:record>
            <marc:record>
              <marc:datafield tag="245" ind1="0" ind2="0"><marc:subfield code="a">Second</marc:subfield></marc:datafield>
            </marc:record>
        </marc:collection>"#;
        let response = parse_marc_xml(xml).unwrap();
        assert_eq!(response.records.len(), 2);
        assert_eq!(
            response.records[1].first_field("245").unwrap().subfield('a').as_deref(),
            Some("Second")
        );
    }

    #[test]
    fn test_placeholder_subfields_are_absent() {
        let xml = r#"<collection><record>
            <datafield tag="260" ind1=" " ind2=" "><subfield code="b">N/A</subfield></datafield>
        </record></collection>"#;
        let response = parse_marc_xml(xml).unwrap();
        assert_eq!(response.records[0].first_field("260").unwrap().subfield('b'), None);
    }

    #[test]
    fn test_zero_hits_is_not_an_error() {
        let xml = r#"<searchRetrieveResponse><numberOfRecords>0</numberOfRecords></searchRetrieveResponse>"#;
        let response = parse_marc_xml(xml).unwrap();
        assert_eq!(response.number_of_records, Some(0));
        assert!(response.records.is_empty());
    }

    #[test]
    fn test_diagnostics_are_collected() {
        let xml = r#"<searchRetrieveResponse>
            <diagnostics><diagnostic><uri>info:srw/diagnostic/1/10</uri><message>Query syntax error</message></diagnostic></diagnostics>
        </searchRetrieveResponse>"#;
        let response = parse_marc_xml(xml).unwrap();
        assert_eq!(response.diagnostics, vec!["Query syntax error".to_string()]);
    }

    #[test]
    fn test_malformed_payloads_are_errors() {
        assert!(parse_marc_xml("").is_err());
        assert!(parse_marc_xml("<searchRetrieveResponse><records><record></records>").is_err());
        assert!(parse_marc_xml("<html><body>Service unavailable</body></html>").is_err());
    }
}
