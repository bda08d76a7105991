//! Write phase: dependency-ordered service calls.
//!
//! Models are written in [`dependency_order`], datums in series order. A
//! foreign key pointing at a record that is already stored is resolved from
//! it; otherwise the field is left out, parked on the [`Waitlist`] and set by
//! a follow-up update once the record is stored.

use std::collections::VecDeque;

use compact_str::CompactString;
use hashbrown::HashMap;
use tangle_core::{Method, Result, TangleError, dependency_order};

use crate::catalog::{Catalog, assign, lookup};
use crate::datum::{Action, Datum, Slot};
use crate::reference::Reference;
use crate::series::{Batch, Series};
use crate::service::{Permission, Record};
use crate::validate::validate;
use crate::waitlist::{Waiter, Waitlist};

/// One service call made by a write pass (reads included).
#[derive(Debug, Clone, PartialEq)]
pub struct Written {
    pub model: CompactString,
    pub method: Method,
    pub datum: Datum,
    /// Record as returned by the service.
    pub record: Record,
    /// Set for updates issued after a parked foreign key resolved.
    pub follow_up: bool,
}

/// Everything a write pass did, in call order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteLog {
    entries: Vec<Written>,
}

impl WriteLog {
    pub fn entries(&self) -> &[Written] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Written> {
        self.entries.iter()
    }

    /// Stored record for a reference, after its last write.
    pub fn record(&self, model: &str, reference: &Reference) -> Option<&Record> {
        self.entries
            .iter()
            .rev()
            .find(|w| w.model == model && w.datum.reference == *reference)
            .map(|w| &w.record)
    }

    fn push(&mut self, written: Written) {
        self.entries.push(written);
    }
}

pub(crate) struct Writer<'a> {
    catalog: Catalog<'a>,
    permission: Option<&'a dyn Permission>,
}

impl<'a> Writer<'a> {
    pub fn new(catalog: Catalog<'a>, permission: Option<&'a dyn Permission>) -> Self {
        Self { catalog, permission }
    }

    pub async fn write(&self, batch: Batch) -> Result<WriteLog> {
        validate(self.catalog.registry, batch.datums())?;

        let models: Vec<&str> = batch.models().collect();
        let order = dependency_order(self.catalog.registry.graph(), &models)?;
        tangle_core::tangle_trace_plan!(order = ?order, "tangle.normalize.order");

        let mut by_model: HashMap<CompactString, Series> = batch
            .into_series()
            .into_iter()
            .map(|s| (CompactString::from(s.model()), s))
            .collect();

        let mut waitlist = Waitlist::new();
        let mut log = WriteLog::default();
        for model in &order {
            let Some(series) = by_model.remove(model) else {
                continue;
            };
            for datum in series.into_datums() {
                self.write_datum(datum, &mut waitlist, &mut log).await?;
            }
        }

        if !waitlist.is_empty() {
            let unresolved: Vec<String> = waitlist
                .unresolved()
                .map(|(model, reference)| format!("{model} {reference}"))
                .collect();
            tangle_core::tangle_trace_abort!(
                unresolved = unresolved.len(),
                "tangle.normalize.unresolved"
            );
            return Err(TangleError::GraphUnreachable(format!(
                "references never stored: {}",
                unresolved.join(", ")
            )));
        }
        Ok(log)
    }

    async fn write_datum(&self, mut datum: Datum, waitlist: &mut Waitlist, log: &mut WriteLog) -> Result<()> {
        let model = self.catalog.model(&datum.model)?;
        let service = self.catalog.service(&datum.model)?;

        if !datum.discovered {
            if datum.action.discovers() {
                datum.record = self.catalog.discover(&datum).await?;
            }
            datum.discovered = true;
        }
        if datum.record.is_none() && !datum.action.may_create() {
            return Err(TangleError::NotFound(format!(
                "'{}' record for {}",
                datum.model, datum.reference
            )));
        }

        let mut content = Record::new();
        let mut changed = false;
        let mut parked = Vec::new();
        for (name, slot) in &datum.content {
            let value = match slot {
                Slot::Value(value) => value.clone(),
                Slot::Pending { reference, field } => {
                    let target = model
                        .get_field(name)
                        .and_then(|f| f.relation_target())
                        .ok_or_else(|| {
                            TangleError::Configuration(format!(
                                "'{}.{name}' is not a foreign key",
                                datum.model
                            ))
                        })?;
                    match waitlist.resolve(&target.model, reference) {
                        Some(record) => {
                            self.catalog
                                .remote_value(self.catalog.model(&target.model)?, record, field)?
                        }
                        None => {
                            parked.push((
                                target.model.clone(),
                                reference.clone(),
                                Waiter {
                                    model: datum.model.clone(),
                                    reference: datum.reference.clone(),
                                    field: name.clone(),
                                    remote: field.clone(),
                                },
                            ));
                            continue;
                        }
                    }
                }
            };

            let storage = self.catalog.storage(model, name)?;
            if let Some(existing) = &datum.record {
                changed |= match lookup(existing, storage) {
                    Some(stored) => *stored != value,
                    None => !value.is_null(),
                };
            }
            assign(&mut content, storage, value)?;
        }

        let (method, record) = match &datum.record {
            None => {
                self.check(&datum.model, Method::Create, &content).await?;
                (Method::Create, service.create(&content).await?)
            }
            Some(existing) if changed && datum.action.may_update() => {
                let key = self.catalog.record_key(model, existing)?;
                self.check(&datum.model, Method::Update, &content).await?;
                (Method::Update, service.update(&key, &content).await?)
            }
            Some(existing) => (Method::Read, existing.clone()),
        };
        tangle_core::tangle_trace_write!(
            model = %datum.model,
            action = method.as_str(),
            reference = %datum.reference,
            "tangle.normalize.write"
        );

        for (target, reference, waiter) in parked {
            waitlist.park(&target, &reference, waiter);
        }
        let released = waitlist.record(&datum.model, &datum.reference, record.clone());
        let awaited = (datum.model.clone(), datum.reference.clone());
        log.push(Written {
            model: datum.model.clone(),
            method,
            datum,
            record,
            follow_up: false,
        });

        let queue = released.into_iter().map(|w| (awaited.clone(), w)).collect();
        self.follow_up(queue, waitlist, log).await
    }

    /// Sets parked foreign keys now that the records they wait on exist.
    async fn follow_up(
        &self,
        mut queue: VecDeque<((CompactString, Reference), Waiter)>,
        waitlist: &mut Waitlist,
        log: &mut WriteLog,
    ) -> Result<()> {
        while let Some(((awaited_model, awaited_reference), waiter)) = queue.pop_front() {
            let Some(awaited) = waitlist.resolve(&awaited_model, &awaited_reference) else {
                return Err(TangleError::GraphUnreachable(format!(
                    "'{awaited_model}' record for {awaited_reference} was never stored"
                )));
            };
            let value =
                self.catalog
                    .remote_value(self.catalog.model(&awaited_model)?, awaited, &waiter.remote)?;

            let holder_model = self.catalog.model(&waiter.model)?;
            let Some(holder) = waitlist.resolve(&waiter.model, &waiter.reference).cloned() else {
                return Err(TangleError::GraphUnreachable(format!(
                    "'{}' record for {} was never stored",
                    waiter.model, waiter.reference
                )));
            };
            let key = self.catalog.record_key(holder_model, &holder)?;

            let mut patch = Record::new();
            assign(
                &mut patch,
                self.catalog.storage(holder_model, &waiter.field)?,
                value.clone(),
            )?;
            self.check(&waiter.model, Method::Update, &patch).await?;
            let updated = self
                .catalog
                .service(&waiter.model)?
                .update(&key, &patch)
                .await?;
            tangle_core::tangle_trace_write!(
                model = %waiter.model,
                field = %waiter.field,
                reference = %waiter.reference,
                "tangle.normalize.follow_up"
            );

            let mut datum = Datum::new(waiter.model.clone(), waiter.reference.clone(), Action::Update);
            datum.set(waiter.field.clone(), value);
            datum.record = Some(holder);
            datum.discovered = true;

            let next = waitlist.record(&waiter.model, &waiter.reference, updated.clone());
            let holder_slot = (waiter.model.clone(), waiter.reference.clone());
            queue.extend(next.into_iter().map(|w| (holder_slot.clone(), w)));

            log.push(Written {
                model: waiter.model,
                method: Method::Update,
                datum,
                record: updated,
                follow_up: true,
            });
        }
        Ok(())
    }

    async fn check(&self, model: &str, method: Method, content: &Record) -> Result<()> {
        if let Some(permission) = self.permission
            && !permission.allow(model, method, content).await
        {
            tangle_core::tangle_trace_abort!(
                model = %model,
                action = method.as_str(),
                "tangle.normalize.denied"
            );
            return Err(TangleError::Denied(format!("{} on '{model}'", method.as_str())));
        }
        Ok(())
    }
}
