use std::collections::HashSet;
use std::str::FromStr;

use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use rust_decimal::Decimal;

use crate::core::*;

/// Parse an NF-e XML document (`nfeProc` or bare `NFe`) into an [`ImportedInvoice`].
///
/// Numeric fields that are absent come back as zero; units are normalized;
/// `SEM GTIN` barcodes become `None`. A document without any `det` element
/// parses successfully with an empty line list.
pub fn from_nfe_xml(xml: &str) -> Result<ImportedInvoice, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut p = NfeParsed::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e);
                p.handle_start(&name, e);
                path.push(name);
            }
            Ok(Event::Empty(ref e)) => {
                let name = local_name(e);
                p.handle_start(&name, e);
                p.handle_end(&name);
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| ParseError::Xml(err.to_string()))?;
                if !text.is_empty() {
                    p.handle_text(&path, &text);
                }
            }
            Ok(Event::CData(ref e)) => {
                let text = String::from_utf8_lossy(e).to_string();
                if !text.trim().is_empty() {
                    p.handle_text(&path, text.trim());
                }
            }
            Ok(Event::End(_)) => {
                let ended = path.pop().unwrap_or_default();
                p.handle_end(&ended);
            }
            Ok(Event::Eof) => {
                if let Some(open) = path.last() {
                    return Err(ParseError::Xml(format!(
                        "unexpected end of document inside <{open}>"
                    )));
                }
                break;
            }
            Err(e) => return Err(ParseError::Xml(e.to_string())),
            _ => {}
        }
    }

    p.into_invoice()
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

#[derive(Default)]
struct NfeParsed {
    saw_inf_nfe: bool,
    id_attr: Option<String>,
    protocol_key: Option<String>,

    number: Option<String>,
    series: Option<String>,
    issue_timestamp: Option<String>,
    issue_date: Option<String>,
    nature_of_operation: Option<String>,

    emit_cnpj: Option<String>,
    emit_cpf: Option<String>,
    emit_name: Option<String>,
    emit_trade_name: Option<String>,
    emit_ie: Option<String>,
    address: Address,

    total_products: Option<String>,
    total_freight: Option<String>,
    total_insurance: Option<String>,
    total_discount: Option<String>,
    total_other: Option<String>,
    total_ipi: Option<String>,
    total_grand: Option<String>,

    payment_code: Option<String>,

    installments: Vec<NfeInstallment>,
    current_installment: Option<NfeInstallment>,

    lines: Vec<NfeLine>,
    current_line: Option<NfeLine>,
}

#[derive(Default)]
struct NfeLine {
    item_number: Option<String>,
    code: Option<String>,
    ean: Option<String>,
    ean_taxable: Option<String>,
    description: Option<String>,
    ncm: Option<String>,
    cest: Option<String>,
    cfop: Option<String>,
    unit: Option<String>,
    quantity: Option<String>,
    unit_value: Option<String>,
    total: Option<String>,
    discount: Option<String>,
}

#[derive(Default)]
struct NfeInstallment {
    number: Option<String>,
    due_date: Option<String>,
    amount: Option<String>,
}

impl NfeParsed {
    fn handle_start(&mut self, name: &str, e: &BytesStart<'_>) {
        match name {
            "infNFe" => {
                self.saw_inf_nfe = true;
                self.id_attr = attribute(e, "Id");
            }
            "det" => {
                self.current_line = Some(NfeLine {
                    item_number: attribute(e, "nItem"),
                    ..Default::default()
                });
            }
            "dup" => self.current_installment = Some(NfeInstallment::default()),
            _ => {}
        }
    }

    fn handle_end(&mut self, name: &str) {
        match name {
            "det" => {
                if let Some(line) = self.current_line.take() {
                    self.lines.push(line);
                }
            }
            "dup" => {
                if let Some(dup) = self.current_installment.take() {
                    self.installments.push(dup);
                }
            }
            _ => {}
        }
    }

    fn handle_text(&mut self, path: &[String], text: &str) {
        let leaf = path.last().map(|s| s.as_str()).unwrap_or("");
        let parent = if path.len() >= 2 {
            path[path.len() - 2].as_str()
        } else {
            ""
        };
        let value = Some(text.to_string());

        match parent {
            "ide" => match leaf {
                "nNF" => self.number = value,
                "serie" => self.series = value,
                "dhEmi" => self.issue_timestamp = value,
                "dEmi" => self.issue_date = value,
                "natOp" => self.nature_of_operation = value,
                _ => {}
            },
            "emit" => match leaf {
                "CNPJ" => self.emit_cnpj = value,
                "CPF" => self.emit_cpf = value,
                "xNome" => self.emit_name = value,
                "xFant" => self.emit_trade_name = value,
                "IE" => self.emit_ie = value,
                _ => {}
            },
            "enderEmit" => match leaf {
                "xLgr" => self.address.street = value,
                "nro" => self.address.number = value,
                "xCpl" => self.address.complement = value,
                "xBairro" => self.address.district = value,
                "cMun" => self.address.city_code = value,
                "xMun" => self.address.city = value,
                "UF" => self.address.state = value,
                "CEP" => self.address.postal_code = value,
                "fone" => self.address.phone = value,
                _ => {}
            },
            "prod" => {
                if let Some(line) = self.current_line.as_mut() {
                    match leaf {
                        "cProd" => line.code = value,
                        "cEAN" => line.ean = value,
                        "cEANTrib" => line.ean_taxable = value,
                        "xProd" => line.description = value,
                        "NCM" => line.ncm = value,
                        "CEST" => line.cest = value,
                        "CFOP" => line.cfop = value,
                        "uCom" => line.unit = value,
                        "qCom" => line.quantity = value,
                        "vUnCom" => line.unit_value = value,
                        "vProd" => line.total = value,
                        "vDesc" => line.discount = value,
                        _ => {}
                    }
                }
            }
            "ICMSTot" => match leaf {
                "vProd" => self.total_products = value,
                "vFrete" => self.total_freight = value,
                "vSeg" => self.total_insurance = value,
                "vDesc" => self.total_discount = value,
                "vOutro" => self.total_other = value,
                "vIPI" => self.total_ipi = value,
                "vNF" => self.total_grand = value,
                _ => {}
            },
            "dup" => {
                if let Some(dup) = self.current_installment.as_mut() {
                    match leaf {
                        "nDup" => dup.number = value,
                        "dVenc" => dup.due_date = value,
                        "vDup" => dup.amount = value,
                        _ => {}
                    }
                }
            }
            // Layout 4.00 nests tPag in detPag; 3.10 put it directly under pag.
            "detPag" | "pag" if leaf == "tPag" => {
                if self.payment_code.is_none() {
                    self.payment_code = value;
                }
            }
            "infProt" if leaf == "chNFe" => self.protocol_key = value,
            _ => {}
        }
    }

    fn into_invoice(self) -> Result<ImportedInvoice, ParseError> {
        if !self.saw_inf_nfe {
            return Err(ParseError::NotAnInvoice);
        }

        let number = self
            .number
            .filter(|n| !n.trim().is_empty())
            .ok_or(ParseError::MissingField { field: "ide/nNF" })?;

        let issue_date = match (self.issue_timestamp, self.issue_date) {
            (Some(ts), _) => parse_date("ide/dhEmi", &ts)?,
            (None, Some(d)) => parse_date("ide/dEmi", &d)?,
            (None, None) => return Err(ParseError::MissingField { field: "ide/dhEmi" }),
        };

        let tax_id = self
            .emit_cnpj
            .or(self.emit_cpf)
            .map(|id| normalize_tax_id(&id))
            .filter(|id| !id.is_empty())
            .ok_or(ParseError::MissingField { field: "emit/CNPJ" })?;

        let access_key = self
            .id_attr
            .as_deref()
            .map(strip_key_prefix)
            .filter(|k| !k.is_empty())
            .or_else(|| self.protocol_key.map(|k| k.trim().to_string()));

        let totals = InvoiceTotals {
            products: parse_amount("ICMSTot/vProd", self.total_products.as_deref())?,
            freight: parse_amount("ICMSTot/vFrete", self.total_freight.as_deref())?,
            insurance: parse_amount("ICMSTot/vSeg", self.total_insurance.as_deref())?,
            discount: parse_amount("ICMSTot/vDesc", self.total_discount.as_deref())?,
            other: parse_amount("ICMSTot/vOutro", self.total_other.as_deref())?,
            ipi: parse_amount("ICMSTot/vIPI", self.total_ipi.as_deref())?,
            grand_total: parse_amount("ICMSTot/vNF", self.total_grand.as_deref())?,
        };

        let mut installments = Vec::with_capacity(self.installments.len());
        for dup in self.installments {
            installments.push(Installment {
                number: dup.number.unwrap_or_default(),
                due_date: dup
                    .due_date
                    .as_deref()
                    .map(|d| parse_date("dup/dVenc", d))
                    .transpose()?,
                amount: parse_amount("dup/vDup", dup.amount.as_deref())?,
            });
        }

        let mut lines = Vec::with_capacity(self.lines.len());
        let mut seen = HashSet::with_capacity(self.lines.len());
        for (idx, pl) in self.lines.into_iter().enumerate() {
            let line_number = pl
                .item_number
                .as_deref()
                .and_then(|n| n.trim().parse().ok())
                .unwrap_or(idx as u32 + 1);
            if !seen.insert(line_number) {
                return Err(ParseError::DuplicateItem { line: line_number });
            }
            lines.push(ImportedLineItem {
                line_number,
                code: pl.code.unwrap_or_default(),
                description: pl.description.unwrap_or_default(),
                tax: TaxClassification {
                    ncm: pl.ncm,
                    cest: pl.cest,
                    cfop: pl.cfop,
                },
                unit: normalize_unit(pl.unit.as_deref().unwrap_or("")),
                quantity: parse_amount("prod/qCom", pl.quantity.as_deref())?,
                unit_value: parse_amount("prod/vUnCom", pl.unit_value.as_deref())?,
                total: parse_amount("prod/vProd", pl.total.as_deref())?,
                discount: parse_amount("prod/vDesc", pl.discount.as_deref())?,
                barcode: clean_barcode(pl.ean).or_else(|| clean_barcode(pl.ean_taxable)),
            });
        }

        Ok(ImportedInvoice {
            header: ImportedInvoiceHeader {
                access_key,
                number: number.trim().to_string(),
                series: self.series.unwrap_or_default(),
                issue_date,
                nature_of_operation: self.nature_of_operation,
                counterparty: Counterparty {
                    tax_id,
                    legal_name: self.emit_name.unwrap_or_default(),
                    trade_name: self.emit_trade_name,
                    state_registration: self.emit_ie,
                    address: self.address,
                },
                totals,
                payment_method: self
                    .payment_code
                    .as_deref()
                    .map(PaymentMethod::from_code)
                    .unwrap_or_default(),
                installments,
            },
            lines,
        })
    }
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key.as_bytes())
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

/// "NFe3524..." -> "3524...".
fn strip_key_prefix(id: &str) -> String {
    id.trim()
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .to_string()
}

fn parse_amount(field: &'static str, raw: Option<&str>) -> Result<Decimal, ParseError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Decimal::ZERO),
        Some(s) => Decimal::from_str(s).map_err(|_| ParseError::InvalidNumber {
            field,
            value: s.to_string(),
        }),
    }
}

/// Accepts a plain date or an ISO timestamp; only the date part is kept.
fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate, ParseError> {
    let raw = raw.trim();
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| ParseError::InvalidDate {
        field,
        value: raw.to_string(),
    })
}

fn clean_barcode(raw: Option<String>) -> Option<String> {
    let code = raw?.trim().to_string();
    if code.is_empty() || code.eq_ignore_ascii_case("SEM GTIN") {
        None
    } else {
        Some(code)
    }
}
