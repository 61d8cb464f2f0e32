//! Tabla hash con encadenamiento separado.
//!
//! Las cubetas crecen sobre la secuencia de los primos más grandes
//! menores que potencias de dos sucesivas, comenzando en 2^5. Cada
//! primo se obtiene restando a la potencia su delta precalculado. Al
//! exceder el factor de carga máximo, toda cadena se reubica
//! recalculando su cubeta módulo el nuevo tamaño.

use std::mem;

/// Índice inicial en la tabla de deltas; la primera cubeta real
/// corresponde al índice siguiente.
const INITIAL_DELTA_INDEX: usize = 4;

/// Factor de carga que dispara el crecimiento.
const MAX_LOADFACTOR: f32 = 0.75;

/// Diferencias entre 2^k y el primo más grande menor que 2^k.
const DELTA: [u32; 32] = [
    0, 0, 1, 1, 3, 1, 3, 1, 5, 3, 3, 9, 3, 1, 3, 19, 15, 1, 5, 1, 3, 9, 3, 15, 3, 39, 5, 39, 57,
    3, 35, 1,
];

/// Una entrada encadenada de la tabla.
struct Entry<V> {
    key: String,
    value: V,
    next: Option<Box<Entry<V>>>,
}

/// Tabla hash de identificadores.
pub struct HashTab<V> {
    table: Vec<Option<Box<Entry<V>>>>,
    num_entries: usize,
    idx: usize,
}

impl<V> HashTab<V> {
    /// Crea una tabla vacía con el número inicial de cubetas.
    pub fn new() -> Self {
        let mut table = HashTab {
            table: Vec::new(),
            num_entries: 0,
            idx: INITIAL_DELTA_INDEX,
        };

        let size = table.grow_size();
        table.table = (0..size).map(|_| None).collect();
        table
    }

    /// Número de entradas almacenadas.
    pub fn len(&self) -> usize {
        self.num_entries
    }

    /// Número actual de cubetas.
    #[cfg(test)]
    pub fn buckets(&self) -> usize {
        self.table.len()
    }

    /// Busca el valor asociado a una llave.
    pub fn search(&self, key: &str) -> Option<&V> {
        let bucket = Self::hash(key, self.table.len());

        let mut entry = self.table[bucket].as_deref();
        while let Some(e) = entry {
            if e.key == key {
                return Some(&e.value);
            }

            entry = e.next.as_deref();
        }

        None
    }

    /// Inserta una asociación llave-valor.
    ///
    /// Las llaves no se comparan aquí; el llamador decide si una llave
    /// repetida es un error consultando [`HashTab::search`] primero.
    pub fn insert(&mut self, key: String, value: V) {
        let bucket = Self::hash(&key, self.table.len());
        let entry = Box::new(Entry {
            key,
            value,
            next: self.table[bucket].take(),
        });

        self.table[bucket] = Some(entry);
        self.num_entries += 1;

        let loadfactor = self.num_entries as f32 / self.table.len() as f32;
        if loadfactor > MAX_LOADFACTOR {
            self.rehash();
        }
    }

    /// Avanza al siguiente primo de la secuencia y lo retorna.
    fn grow_size(&mut self) -> usize {
        self.idx += 1;
        (1usize << self.idx) - DELTA[self.idx] as usize
    }

    /// Reubica cada entrada de cada cadena en una tabla más grande.
    fn rehash(&mut self) {
        let new_size = self.grow_size();
        let old = mem::replace(&mut self.table, (0..new_size).map(|_| None).collect());

        for mut slot in old {
            while let Some(mut entry) = slot {
                slot = entry.next.take();

                let bucket = Self::hash(&entry.key, new_size);
                entry.next = self.table[bucket].take();
                self.table[bucket] = Some(entry);
            }
        }
    }

    /// Corrimiento cíclico de 5 bits de la suma en curso, reducido
    /// módulo el tamaño menos uno.
    fn hash(key: &str, size: usize) -> usize {
        let mut h: u32 = 0;
        for &byte in key.as_bytes() {
            h = h.rotate_left(5).wrapping_add(u32::from(byte));
        }

        (h % (size as u32 - 1)) as usize
    }
}

impl<V> Default for HashTab<V> {
    fn default() -> Self {
        HashTab::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_the_prime_below_two_to_the_fifth() {
        let table: HashTab<u32> = HashTab::new();
        assert_eq!(table.buckets(), 31);
    }

    #[test]
    fn finds_what_was_inserted() {
        let mut table = HashTab::new();
        table.insert(String::from("alpha"), 1);
        table.insert(String::from("beta"), 2);

        assert_eq!(table.search("alpha"), Some(&1));
        assert_eq!(table.search("beta"), Some(&2));
        assert_eq!(table.search("gamma"), None);
    }

    #[test]
    fn survives_collisions_in_one_bucket() {
        // Con pocas entradas sobre 31 cubetas alguna colisión es
        // prácticamente segura entre 20 llaves
        let mut table = HashTab::new();
        for i in 0..20 {
            table.insert(format!("key{}", i), i);
        }

        for i in 0..20 {
            assert_eq!(table.search(&format!("key{}", i)), Some(&i));
        }
    }

    #[test]
    fn grows_to_the_next_prime_when_loaded() {
        let mut table = HashTab::new();

        // 23 entradas sobre 31 cubetas quedan bajo el factor de carga
        for i in 0..23 {
            table.insert(format!("key{}", i), i);
        }
        assert_eq!(table.buckets(), 31);

        // La siguiente lo excede y reubica todo en 63 cubetas
        table.insert(String::from("key23"), 23);
        assert_eq!(table.buckets(), 63);
        assert_eq!(table.len(), 24);

        for i in 0..24 {
            assert_eq!(table.search(&format!("key{}", i)), Some(&i));
        }
    }
}
