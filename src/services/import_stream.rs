// src/services/import_stream.rs
//
// Leitura incremental do arquivo de importação: cada elemento das seções
// `sales`, `companies`, `contacts`, `notes` e `tasks` é entregue assim que
// termina de ser lido, sem carregar a seção inteira na memória.
//
// A ordem de entrega é sempre a das dependências (vendedores, empresas,
// contatos, notas/tarefas), qualquer que seja a ordem das chaves no arquivo.
// Uma seção que aparece antes das que ela referencia vai para um arquivo
// temporário e é reenviada assim que as anteriores terminam.

use std::{
    collections::HashSet,
    fmt,
    fs::File,
    io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write},
};

use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::models::import::{ImportSection, SectionRecord};

pub type StreamItem = Result<SectionRecord, String>;

// Mensagem interna: o importador parou de consumir
const RECEIVER_CLOSED: &str = "import receiver closed";

/// Lê o documento e envia cada registro pelo canal (bloqueante).
///
/// Deve rodar fora do runtime assíncrono (`spawn_blocking`). Um erro de
/// sintaxe ou de E/S vira um último item `Err` no canal; as seções que
/// estavam guardadas esperando dependências são descartadas.
pub fn stream_records<R: Read>(reader: R, tx: &mpsc::Sender<StreamItem>) {
    let mut deserializer = serde_json::Deserializer::from_reader(BufReader::new(reader));

    let result = de::Deserializer::deserialize_map(&mut deserializer, RootVisitor { tx })
        .and_then(|spool| deserializer.end().map(|_| spool))
        .map_err(|e| e.to_string())
        .and_then(|mut spool| spool.replay(tx, true));

    if let Err(e) = result {
        if e.starts_with(RECEIVER_CLOSED) {
            return;
        }
        let _ = tx.blocking_send(Err(format!("Invalid import file: {}", e)));
    }
}

/// Dispara a leitura numa thread bloqueante e devolve o lado receptor.
/// A capacidade limitada do canal segura o parser quando o importador atrasa.
pub fn spawn_reader<R>(reader: R, capacity: usize) -> mpsc::Receiver<StreamItem>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    tokio::task::spawn_blocking(move || stream_records(reader, &tx));
    rx
}

fn send(tx: &mpsc::Sender<StreamItem>, section: ImportSection, value: Value) -> Result<(), String> {
    tx.blocking_send(Ok(SectionRecord { section, value }))
        .map_err(|_| RECEIVER_CLOSED.to_string())
}

/// Seções guardadas em disco até as suas dependências serem entregues.
#[derive(Default)]
struct Spool {
    delivered: HashSet<ImportSection>,
    pending: Vec<(ImportSection, BufWriter<File>)>,
}

impl Spool {
    // Todas as seções de que `section` depende já foram entregues
    fn is_ready(&self, section: ImportSection) -> bool {
        ImportSection::ALL
            .iter()
            .filter(|s| s.depth() < section.depth())
            .all(|s| self.delivered.contains(s))
    }

    fn writer(&mut self, section: ImportSection) -> Result<&mut BufWriter<File>, String> {
        let index = match self.pending.iter().position(|(s, _)| *s == section) {
            Some(index) => index,
            None => {
                let file = tempfile::tempfile().map_err(|e| format!("cannot buffer {}: {}", section.key(), e))?;
                self.pending.push((section, BufWriter::new(file)));
                self.pending.len() - 1
            }
        };
        Ok(&mut self.pending[index].1)
    }

    /// Reenvia, na ordem das dependências, o que já pode seguir. No fim do
    /// arquivo (`at_end`) as seções ausentes não seguram mais nada.
    fn replay(&mut self, tx: &mpsc::Sender<StreamItem>, at_end: bool) -> Result<(), String> {
        for section in ImportSection::ALL {
            let Some(index) = self.pending.iter().position(|(s, _)| *s == section) else {
                continue;
            };
            if !at_end && !self.is_ready(section) {
                continue;
            }

            let (_, writer) = self.pending.remove(index);
            let mut file = writer.into_inner().map_err(|e| e.to_string())?;
            file.seek(SeekFrom::Start(0)).map_err(|e| e.to_string())?;

            let records = serde_json::Deserializer::from_reader(BufReader::new(file)).into_iter::<Value>();
            for value in records {
                send(tx, section, value.map_err(|e| e.to_string())?)?;
            }
            self.delivered.insert(section);
        }
        Ok(())
    }
}

struct RootVisitor<'a> {
    tx: &'a mpsc::Sender<StreamItem>,
}

impl<'de> Visitor<'de> for RootVisitor<'_> {
    type Value = Spool;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object with sales, companies, contacts, notes and tasks arrays")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Spool, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut spool = Spool::default();

        while let Some(key) = map.next_key::<String>()? {
            let Some(section) = ImportSection::from_key(&key) else {
                // Chaves desconhecidas são puladas sem montar o valor
                map.next_value::<IgnoredAny>()?;
                continue;
            };

            if spool.is_ready(section) {
                map.next_value_seed(SectionSeed { section, sink: Sink::Channel(self.tx) })?;
                spool.delivered.insert(section);
                spool.replay(self.tx, false).map_err(de::Error::custom)?;
            } else {
                let writer = spool.writer(section).map_err(de::Error::custom)?;
                map.next_value_seed(SectionSeed { section, sink: Sink::Spool(writer) })?;
            }
        }
        Ok(spool)
    }
}

enum Sink<'a> {
    Channel(&'a mpsc::Sender<StreamItem>),
    Spool(&'a mut BufWriter<File>),
}

impl Sink<'_> {
    fn push(&mut self, section: ImportSection, value: Value) -> Result<(), String> {
        match self {
            Sink::Channel(tx) => send(tx, section, value),
            Sink::Spool(writer) => serde_json::to_writer(&mut **writer, &value)
                .map_err(|e| e.to_string())
                .and_then(|_| writer.write_all(b"\n").map_err(|e| e.to_string())),
        }
    }
}

struct SectionSeed<'a> {
    section: ImportSection,
    sink: Sink<'a>,
}

impl<'de> DeserializeSeed<'de> for SectionSeed<'_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for SectionSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "an array of {} records", self.section.singular())
    }

    // "notes": null equivale a uma seção vazia
    fn visit_unit<E: de::Error>(self) -> Result<(), E> {
        Ok(())
    }

    fn visit_seq<A>(mut self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(value) = seq.next_element::<Value>()? {
            self.sink.push(self.section, value).map_err(de::Error::custom)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collect(input: &'static str) -> Vec<StreamItem> {
        let (tx, mut rx) = mpsc::channel(64);
        std::thread::spawn(move || stream_records(input.as_bytes(), &tx))
            .join()
            .unwrap();
        let mut items = vec![];
        while let Ok(item) = rx.try_recv() {
            items.push(item);
        }
        items
    }

    #[test]
    fn yields_records_in_file_order() {
        let items = collect(
            r#"{
                "sales": [{"id": 1, "email": "a@b.c"}],
                "meta": {"exportedAt": "2024-01-01", "nested": [1, 2, 3]},
                "contacts": [{"id": 10}, {"id": 11}],
                "notes": null
            }"#,
        );

        let records: Vec<SectionRecord> = items.into_iter().map(|i| i.unwrap()).collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].section, ImportSection::Sales);
        assert_eq!(records[1], SectionRecord { section: ImportSection::Contacts, value: json!({"id": 10}) });
        assert_eq!(records[2].value["id"], 11);
    }

    #[test]
    fn truncated_file_ends_with_an_error_after_the_complete_records() {
        let items = collect(r#"{"sales": [{"id": 1, "email": "a@b.c"}, {"id": 2, "em"#);

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        let err = items[1].as_ref().unwrap_err();
        assert!(err.starts_with("Invalid import file"), "{}", err);
    }

    fn sections(items: Vec<StreamItem>) -> Vec<(ImportSection, i64)> {
        items
            .into_iter()
            .map(|i| i.unwrap())
            .map(|r| (r.section, r.value["id"].as_i64().unwrap()))
            .collect()
    }

    #[test]
    fn sorted_keys_are_delivered_in_dependency_order() {
        // Ordem alfabética, como sai de `jq -S` ou de um serializador com chaves ordenadas
        let items = collect(
            r#"{
                "companies": [{"id": 10}],
                "contacts": [{"id": 100}, {"id": 101}],
                "notes": [{"id": 1000}],
                "sales": [{"id": 1}],
                "tasks": [{"id": 2000}]
            }"#,
        );

        assert_eq!(
            sections(items),
            vec![
                (ImportSection::Sales, 1),
                (ImportSection::Companies, 10),
                (ImportSection::Contacts, 100),
                (ImportSection::Contacts, 101),
                (ImportSection::Notes, 1000),
                (ImportSection::Tasks, 2000),
            ]
        );
    }

    #[test]
    fn missing_sections_do_not_hold_back_the_rest() {
        let items = collect(r#"{"tasks": [{"id": 3}], "contacts": [{"id": 2}], "notes": [{"id": 4}]}"#);

        assert_eq!(
            sections(items),
            vec![
                (ImportSection::Contacts, 2),
                (ImportSection::Notes, 4),
                (ImportSection::Tasks, 3),
            ]
        );
    }

    #[test]
    fn held_sections_are_dropped_when_the_file_is_broken() {
        let items = collect(r#"{"notes": [{"id": 4}], "sales": [{"id": 1}], "companies": [{"id": 2"#);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().section, ImportSection::Sales);
        assert!(items[1].is_err());
    }

    #[test]
    fn section_must_be_an_array() {
        let items = collect(r#"{"tasks": {"id": 1}}"#);

        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().unwrap_err().contains("array of task records"));
    }

    #[test]
    fn root_must_be_an_object() {
        let items = collect(r#"[1, 2]"#);
        assert!(items[0].is_err());
    }

    #[tokio::test]
    async fn spawn_reader_streams_from_a_blocking_thread() {
        let mut rx = spawn_reader(&br#"{"tags": ["x"], "sales": [{"id": 1}, {"id": 2}]}"#[..], 1);

        let mut ids = vec![];
        while let Some(item) = rx.recv().await {
            ids.push(item.unwrap().value["id"].as_i64().unwrap());
        }
        assert_eq!(ids, vec![1, 2]);
    }
}
